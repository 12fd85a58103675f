use axum::http::StatusCode;

/// Failures a request can surface. Dimension sniffing and cache I/O never
/// appear here: both degrade silently.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Invalid image URL.")]
    InvalidUrl(String),

    #[error("Invalid image URL: protocol {0} is not allowed.")]
    InvalidProtocol(String),

    #[error("Host not allowed.")]
    HostNotAllowed(String),

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Image at {url} exceeds {}MB", .limit / 1024 / 1024)]
    TooLarge { url: String, limit: u64 },

    #[error("Invalid content type '{content_type}' from {url}")]
    BadContentType { url: String, content_type: String },
}

impl OverlayError {
    pub fn fetch_failed(url: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_) | Self::InvalidProtocol(_) | Self::HostNotAllowed(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Upstream HTTP status, when the failure carried one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::FetchFailed { status, .. } => *status,
            _ => None,
        }
    }
}
