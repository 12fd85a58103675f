use sha2::{Digest, Sha256};
use url::Url;

pub fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity of a background image in the record store.
///
/// Built from the origin URL with its query pairs sorted by name, prefixed
/// with the cache-format version. Bumping the version orphans every older
/// record at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    normalized: String,
}

impl CacheKey {
    pub fn new(url: &Url, version: &str) -> Self {
        Self {
            normalized: format!("{version}:{}", normalize_url(url)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Storage path for this key, sharded by the first hash byte.
    pub fn storage_key(&self) -> String {
        let hash = compute_hash(&self.normalized);
        format!("backgrounds/{}/{hash}.json", &hash[..2])
    }
}

/// Sorts query pairs by name. Values of repeated names keep their order.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        normalized.set_query(None);
    } else {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        normalized.query_pairs_mut().clear().extend_pairs(pairs);
    }
    normalized.to_string()
}
