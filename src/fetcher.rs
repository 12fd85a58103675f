use std::time::Duration;

use body::LimitedBody;
use reqwest::{Client, header};
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::OverlayError;

/// Raw bytes of a remote image plus the `Content-Type` the origin declared.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One GET per call, no retries. The client timeout bounds the whole
/// request including the body.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_limits(&config.user_agent, config.fetch_timeout, config.max_image_bytes)
    }

    pub fn with_limits(user_agent: &str, timeout: Duration, max_bytes: u64) -> anyhow::Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("image/*"));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(default_headers)
            .build()?;
        Ok(Self { client, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedImage, OverlayError> {
        debug!(url = %url, "fetching background image");
        let mut response = self.client.get(url.clone()).send().await.map_err(|err| {
            warn!(url = %url, error = %err, "background request failed");
            OverlayError::fetch_failed(url.as_str(), None, err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "background origin returned an error");
            return Err(OverlayError::fetch_failed(
                url.as_str(),
                Some(status.as_u16()),
                format!("HTTP {status}"),
            ));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                warn!(url = %url, length, limit = self.max_bytes, "background exceeds size ceiling");
                return Err(self.too_large(url));
            }
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_string();

        let mut body = LimitedBody::with_limit(self.max_bytes);
        loop {
            let chunk = response.chunk().await.map_err(|err| {
                warn!(url = %url, error = %err, "reading background body failed");
                OverlayError::fetch_failed(url.as_str(), Some(status.as_u16()), err.to_string())
            })?;
            let Some(chunk) = chunk else { break };
            if !body.push(&chunk) {
                warn!(url = %url, limit = self.max_bytes, "background body exceeds size ceiling");
                return Err(self.too_large(url));
            }
        }

        if !content_type.to_ascii_lowercase().starts_with("image/") {
            warn!(url = %url, content_type = %content_type, "background is not an image");
            return Err(OverlayError::BadContentType {
                url: url.to_string(),
                content_type,
            });
        }

        let bytes = body.into_inner();
        debug!(url = %url, size = bytes.len(), content_type = %content_type, "fetched background image");
        Ok(FetchedImage { content_type, bytes })
    }

    fn too_large(&self, url: &Url) -> OverlayError {
        OverlayError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }
}

mod body {
    /// Accumulates body chunks up to a byte ceiling.
    pub struct LimitedBody {
        data: Vec<u8>,
        limit: u64,
    }

    impl LimitedBody {
        pub fn with_limit(limit: u64) -> Self {
            Self {
                data: Vec::with_capacity(8192),
                limit,
            }
        }

        /// Returns false, leaving the buffer untouched, when `chunk` would
        /// push the total past the limit.
        pub fn push(&mut self, chunk: &[u8]) -> bool {
            if (self.data.len() + chunk.len()) as u64 > self.limit {
                return false;
            }
            self.data.extend_from_slice(chunk);
            true
        }

        pub fn into_inner(self) -> Vec<u8> {
            self.data
        }
    }

}
