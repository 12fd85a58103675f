use std::sync::Arc;

use tracing::{info, warn};

use crate::pipeline::{CacheStatus, OverlayService};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    pub fetched: usize,
    pub already_cached: usize,
    pub failed: usize,
}

/// Loads each URL through the cache gateway, one at a time. Invalid or
/// unreachable URLs are logged and skipped.
pub async fn warm_backgrounds(service: &OverlayService, urls: &[String]) -> WarmupReport {
    let mut report = WarmupReport::default();
    for raw in urls {
        let url = match service.validate(raw) {
            Ok(url) => url,
            Err(err) => {
                warn!(url = %raw, error = %err, "skipping warmup url");
                report.failed += 1;
                continue;
            }
        };
        match service.load_background(&url).await {
            Ok(background) => match background.cache_status {
                CacheStatus::Hit => report.already_cached += 1,
                CacheStatus::Miss => report.fetched += 1,
            },
            Err(err) => {
                warn!(url = %url, error = %err, "warmup fetch failed");
                report.failed += 1;
            }
        }
    }
    report
}

/// Runs [`warm_backgrounds`] on a detached task for the configured URLs.
pub fn spawn_warmup(service: Arc<OverlayService>) -> Option<tokio::task::JoinHandle<WarmupReport>> {
    let urls = service.config().warmup_urls.clone();
    if urls.is_empty() {
        return None;
    }
    info!(count = urls.len(), "warming background cache");
    Some(tokio::spawn(async move {
        let report = warm_backgrounds(&service, &urls).await;
        info!(
            fetched = report.fetched,
            already_cached = report.already_cached,
            failed = report.failed,
            "background cache warmup finished"
        );
        report
    }))
}
