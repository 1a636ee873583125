use std::sync::Arc;

use newswire_core::Article;
use newswire_util_error::FmtCompact as _;
use tracing::{debug, warn};

use crate::LOG_TARGET;
use crate::cache::ScrapeCache;
use crate::pipeline::IngestPipeline;

/// One refresh step: ingest (possibly cached), then read what is recent
///
/// Never fails. Ingest errors are logged and the stored articles are still
/// returned; a failing recency read yields an empty list.
#[derive(Clone)]
pub struct Feed {
    cache: Arc<ScrapeCache>,
}

impl Feed {
    pub fn new(cache: Arc<ScrapeCache>) -> Self {
        Self { cache }
    }

    fn pipeline(&self) -> &IngestPipeline {
        self.cache.pipeline()
    }

    pub async fn refresh_recent(&self) -> Vec<Article> {
        match self.cache.ingest().await {
            Ok(report) => {
                debug!(
                    target: LOG_TARGET,
                    scraped = report.articles.len(),
                    persistence = ?report.persistence,
                    "Ingest done"
                );
            }
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    "Ingest failed, serving stored articles only"
                );
            }
        }

        self.recent().await
    }

    /// Recent stored articles without scraping
    pub async fn recent(&self) -> Vec<Article> {
        match self.pipeline().recent_articles().await {
            Ok(articles) => articles,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    "Failed to read recent articles"
                );
                vec![]
            }
        }
    }
}
