use url::Url;

use crate::error::OverlayError;

/// Parses `raw` and admits it only for http(s) with a host that appears
/// verbatim in `allowed_hosts`. No subdomain or wildcard matching.
pub fn validate_image_url(raw: &str, allowed_hosts: &[String]) -> Result<Url, OverlayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OverlayError::InvalidUrl(String::new()));
    }
    let parsed = Url::parse(trimmed).map_err(|_| OverlayError::InvalidUrl(trimmed.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(OverlayError::InvalidProtocol(scheme.to_string())),
    }
    let host = parsed.host_str().unwrap_or_default();
    if !allowed_hosts.iter().any(|allowed| allowed == host) {
        return Err(OverlayError::HostNotAllowed(host.to_string()));
    }
    Ok(parsed)
}
