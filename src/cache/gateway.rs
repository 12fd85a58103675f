use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheRecord, LocalFileStorage};

/// Background-record cache in front of the fetcher.
///
/// Unreadable or invalid records count as misses, stale and zero-sized
/// ones included.
/// Nothing is ever evicted explicitly; stale records are overwritten by the
/// next successful fetch.
#[derive(Clone, Debug)]
pub struct CacheGateway {
    storage: LocalFileStorage,
    version: String,
    ttl: Duration,
}

impl CacheGateway {
    pub fn new(storage: LocalFileStorage, version: impl Into<String>, ttl: Duration) -> Self {
        Self {
            storage,
            version: version.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key_for(&self, url: &url::Url) -> CacheKey {
        CacheKey::new(url, &self.version)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheRecord> {
        let bytes = match self.storage.get(&key.storage_key()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(cache_key = key.as_str(), error = %err, "cache read failed");
                return None;
            }
        };
        let record = match serde_json::from_slice::<CacheRecord>(&bytes) {
            Ok(record) => record,
            Err(err) => {
                warn!(cache_key = key.as_str(), error = %err, "discarding undecodable cache record");
                return None;
            }
        };
        if record.dimensions().is_empty() {
            warn!(cache_key = key.as_str(), "discarding zero-sized cache record");
            return None;
        }
        if record.is_expired_at(Utc::now()) {
            debug!(cache_key = key.as_str(), "cache record expired");
            return None;
        }
        Some(record)
    }

    pub async fn put(&self, key: &CacheKey, record: &CacheRecord) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(record)?;
        self.storage.put(&key.storage_key(), &payload).await
    }

    /// Stores `record` on a detached task. The caller never waits for the
    /// write and failures are only logged.
    pub fn put_detached(&self, key: CacheKey, record: CacheRecord) -> tokio::task::JoinHandle<()> {
        let gateway = self.clone();
        tokio::spawn(async move {
            match gateway.put(&key, &record).await {
                Ok(()) => debug!(cache_key = key.as_str(), "cached background record"),
                Err(err) => warn!(cache_key = key.as_str(), error = %err, "background cache write failed"),
            }
        })
    }
}
