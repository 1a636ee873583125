use std::sync::Arc;
use std::time::Duration;

use newswire_core::{Article, Timestamp};
use async_trait::async_trait;
use newswire_db::{Database, DbResult};
use newswire_util_error::FmtCompact as _;
use snafu::{ResultExt as _, Snafu};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::LOG_TARGET;
use crate::extractor::{ExtractError, Extractor};

pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Snafu)]
pub enum IngestError {
    #[snafu(display("Scrape failed"))]
    ScrapeFailed { source: ExtractError },
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// What happened to the scraped articles in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Nothing was scraped, so nothing was written
    Skipped,
    /// `inserted` articles were new; the rest were already stored
    Stored { inserted: usize },
    /// The write failed; the articles were still returned
    Failed,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Every scraped article, in page order, in-batch duplicates included
    ///
    /// `published_at` is derived from this scrape; for articles that were
    /// already stored, the stored value is left untouched.
    pub articles: Vec<Article>,
    pub persistence: Persistence,
}

/// Where the pipeline keeps articles
#[async_trait]
pub trait ArticleStore {
    /// Store articles whose link is not stored yet; returns how many were new
    async fn insert_articles_skip_duplicates(&self, articles: &[Article]) -> DbResult<usize>;

    /// Stored articles published at or after `cutoff`, newest first
    async fn get_articles_published_since(&self, cutoff: Timestamp) -> DbResult<Vec<Article>>;
}

#[async_trait]
impl ArticleStore for Database {
    async fn insert_articles_skip_duplicates(&self, articles: &[Article]) -> DbResult<usize> {
        Database::insert_articles_skip_duplicates(self, articles).await
    }

    async fn get_articles_published_since(&self, cutoff: Timestamp) -> DbResult<Vec<Article>> {
        Database::get_articles_published_since(self, cutoff).await
    }
}

/// Scrape, normalize, and store
pub struct IngestPipeline {
    extractor: Arc<dyn Extractor + Send + Sync>,
    store: Arc<dyn ArticleStore + Send + Sync>,
    recency_window: Duration,
}

impl IngestPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor + Send + Sync>,
        store: Arc<dyn ArticleStore + Send + Sync>,
    ) -> Self {
        Self {
            extractor,
            store,
            recency_window: DEFAULT_RECENCY_WINDOW,
        }
    }

    pub fn with_recency_window(mut self, recency_window: Duration) -> Self {
        self.recency_window = recency_window;
        self
    }

    pub fn recency_window(&self) -> Duration {
        self.recency_window
    }

    pub async fn run(&self) -> IngestResult<IngestReport> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Like [`Self::run`], resolving every relative age against `now`
    pub async fn run_at(&self, now: OffsetDateTime) -> IngestResult<IngestReport> {
        let raw = self.extractor.extract().await.context(ScrapeFailedSnafu)?;

        let articles: Vec<Article> = raw
            .into_iter()
            .map(|raw| raw.into_article(now))
            .collect();

        if articles.is_empty() {
            debug!(target: LOG_TARGET, "No articles scraped, skipping insert");
            return Ok(IngestReport {
                articles,
                persistence: Persistence::Skipped,
            });
        }

        let persistence = match self.store.insert_articles_skip_duplicates(&articles).await {
            Ok(inserted) => {
                info!(
                    target: LOG_TARGET,
                    scraped = articles.len(),
                    inserted,
                    "Stored scraped articles"
                );
                Persistence::Stored { inserted }
            }
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    scraped = articles.len(),
                    "Failed to store scraped articles"
                );
                Persistence::Failed
            }
        };

        Ok(IngestReport {
            articles,
            persistence,
        })
    }

    /// Stored articles published within the recency window, newest first
    pub async fn recent_articles(&self) -> DbResult<Vec<Article>> {
        self.recent_articles_at(Timestamp::now()).await
    }

    pub async fn recent_articles_at(&self, now: Timestamp) -> DbResult<Vec<Article>> {
        let cutoff = now.saturating_sub_secs(self.recency_window.as_secs());
        self.store.get_articles_published_since(cutoff).await
    }
}
