use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::image_processing::{Dimensions, detect_mime_type};

const OCTET_STREAM: &str = "application/octet-stream";

/// `type/subtype` of a content type, if both halves are restricted-name tokens.
fn essence(content_type: &str) -> Option<&str> {
    let essence = content_type.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    let is_token = |part: &str| {
        !part.is_empty()
            && part.len() <= 127
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '!' | '#' | '$' | '&' | '-' | '^' | '_' | '.' | '+'))
    };
    (is_token(kind) && is_token(subtype)).then_some(essence)
}

/// A fetched background with its sniffed size, as persisted between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub source_url: String,
    pub content_type: String,
    /// Standard base64 of the original bytes.
    pub payload: String,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(
        source_url: &str,
        content_type: &str,
        bytes: &[u8],
        dims: Dimensions,
        ttl: std::time::Duration,
    ) -> Self {
        let content_type = essence(content_type)
            .or_else(|| detect_mime_type(bytes))
            .unwrap_or(OCTET_STREAM);
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            source_url: source_url.to_string(),
            content_type: content_type.to_string(),
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
            width: dims.width,
            height: dims.height,
            created_at,
            expires_at: created_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Media type without parameters, e.g. `image/jpeg` for `image/jpeg; charset=binary`.
    /// Anything that is not a plain `type/subtype` reads as `application/octet-stream`.
    pub fn mime_type(&self) -> &str {
        essence(&self.content_type).unwrap_or(OCTET_STREAM)
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.payload)
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.payload)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn keeps_bytes_and_media_type() {
        let record = CacheRecord::new(
            "https://i.imgur.com/a.png",
            "image/png; charset=binary",
            &[1, 2, 3, 250],
            Dimensions { width: 4, height: 2 },
            Duration::from_secs(60),
        );
        assert_eq!(record.mime_type(), "image/png");
        assert_eq!(record.data_uri(), "data:image/png;base64,AQID+g==");
        assert_eq!(record.decode_payload().unwrap(), vec![1, 2, 3, 250]);
        assert_eq!(record.dimensions(), Dimensions { width: 4, height: 2 });
    }

    #[test]
    fn hostile_content_types_never_reach_the_data_uri() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let record = CacheRecord::new(
            "https://i.imgur.com/a.png",
            r#"image/png"/><script>x</script><x a=""#,
            &png,
            Dimensions::FALLBACK,
            Duration::from_secs(60),
        );
        assert_eq!(record.content_type, "image/png");
        assert_eq!(record.data_uri(), "data:image/png;base64,iVBORw0KGgo=");

        let mut stored = record.clone();
        stored.content_type = "image/png\"><script>".to_string();
        assert_eq!(stored.mime_type(), "application/octet-stream");
        stored.content_type = "image/svg+xml; charset=utf-8".to_string();
        assert_eq!(stored.mime_type(), "image/svg+xml");
    }

    #[test]
    fn expiry_follows_ttl() {
        let record = CacheRecord::new(
            "https://i.imgur.com/a.png",
            "image/png",
            &[],
            Dimensions::FALLBACK,
            Duration::from_secs(60),
        );
        assert!(!record.is_expired_at(record.created_at));
        assert!(record.is_expired_at(record.created_at + chrono::Duration::seconds(60)));
    }

    #[test]
    fn survives_json() {
        let record = CacheRecord::new(
            "https://i.imgur.com/a.png",
            "image/jpeg",
            b"\xFF\xD8",
            Dimensions { width: 10, height: 20 },
            Duration::from_secs(5),
        );
        let json = serde_json::to_vec(&record).unwrap();
        let back: CacheRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, record);
    }
}
