use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::LOG_TARGET;
use crate::pipeline::{IngestPipeline, IngestReport, IngestResult};

pub const DEFAULT_SCRAPE_CACHE_TTL: Duration = Duration::from_secs(30);

struct CachedReport {
    at: Instant,
    report: Arc<IngestReport>,
}

/// Shares one ingest run between callers asking within `ttl` of each other
///
/// While a run is in flight, other callers wait on the lock and then reuse its
/// result. Failed runs are not remembered. A zero `ttl` disables caching.
pub struct ScrapeCache {
    pipeline: Arc<IngestPipeline>,
    ttl: Duration,
    last: Mutex<Option<CachedReport>>,
}

impl ScrapeCache {
    pub fn new(pipeline: Arc<IngestPipeline>, ttl: Duration) -> Self {
        Self {
            pipeline,
            ttl,
            last: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    pub async fn ingest(&self) -> IngestResult<Arc<IngestReport>> {
        if self.ttl.is_zero() {
            return self.pipeline.run().await.map(Arc::new);
        }

        let mut last = self.last.lock().await;

        if let Some(cached) = last.as_ref().filter(|c| c.at.elapsed() < self.ttl) {
            debug!(
                target: LOG_TARGET,
                age_ms = cached.at.elapsed().as_millis(),
                "Reusing recent scrape"
            );
            return Ok(cached.report.clone());
        }

        let report = Arc::new(self.pipeline.run().await?);
        *last = Some(CachedReport {
            at: Instant::now(),
            report: report.clone(),
        });

        Ok(report)
    }
}
