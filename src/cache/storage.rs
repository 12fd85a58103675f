use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;

use crate::cache::compute_hash;

/// Flat key/value blobs under a base directory.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes through a sibling temp file and renames, so concurrent readers
    /// see either the previous blob or the new one. Last writer wins.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let nonce = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let tmp_name = format!(".{}.tmp", &compute_hash(&format!("{key}:{nonce}"))[..16]);
        let tmp_path = path.with_file_name(tmp_name);
        fs::write(&tmp_path, data).await?;
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    pub fn resolve_path(&self, key: &str) -> PathBuf {
        let normalized = key.trim_start_matches('/');
        self.base_dir.join(Path::new(normalized))
    }
}
