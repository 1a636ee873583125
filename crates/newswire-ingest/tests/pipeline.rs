use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use newswire_core::{Article, RawArticle, Timestamp};
use newswire_db::{Database, DbResult};
use newswire_ingest::extractor::{ExtractError, ExtractResult, Extractor};
use newswire_ingest::pipeline::IngestError;
use newswire_ingest::{ArticleStore, Feed, IngestPipeline, Persistence, ScrapeCache};
use reqwest::StatusCode;
use tempfile::{TempDir, tempdir};
use time::OffsetDateTime;

/// A fixed "now" for deterministic tests.
const NOW: i64 = 1_700_000_000;

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(NOW).expect("Valid timestamp")
}

/// Returns a fixed listing, or fails, and counts how often it was asked
struct MockExtractor {
    articles: Option<Vec<RawArticle>>,
    calls: AtomicUsize,
}

impl MockExtractor {
    fn new(articles: Vec<RawArticle>) -> Arc<Self> {
        Arc::new(Self {
            articles: Some(articles),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            articles: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self) -> ExtractResult<Vec<RawArticle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        match &self.articles {
            Some(articles) => Ok(articles.clone()),
            None => Err(ExtractError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
            }),
        }
    }
}

fn raw(link: &str, title: &str, age: &str) -> RawArticle {
    RawArticle {
        title: title.to_owned(),
        link: link.to_owned(),
        score: "1 point".to_owned(),
        relative_age: age.to_owned(),
    }
}

async fn temp_db() -> (TempDir, Arc<Database>) {
    let dir = tempdir().expect("tempdir");
    let db = Database::open(dir.path().join("db.redb"))
        .await
        .expect("db open");
    (dir, Arc::new(db))
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn duplicate_links_in_batch_store_first_and_return_both() {
    let (_dir, db) = temp_db().await;
    let extractor = MockExtractor::new(vec![
        raw("https://x/1", "First", "2 minutes ago"),
        raw("https://x/1", "Second", "1 minute ago"),
    ]);
    let pipeline = IngestPipeline::new(extractor, db.clone());

    let report = pipeline.run_at(now()).await.expect("ingest");

    assert_eq!(report.articles.len(), 2);
    assert_eq!(report.persistence, Persistence::Stored { inserted: 1 });
    assert_eq!(db.count_articles().await.expect("count"), 1);

    let stored = db
        .get_article("https://x/1")
        .await
        .expect("read")
        .expect("stored");
    assert_eq!(stored.title, "First");
    assert_eq!(stored.published_at, Timestamp((NOW - 120) as u64));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn second_pass_keeps_first_seen_record() {
    let (_dir, db) = temp_db().await;

    let first = IngestPipeline::new(
        MockExtractor::new(vec![raw("https://x/1", "Original", "3 minutes ago")]),
        db.clone(),
    );
    first.run_at(now()).await.expect("ingest");

    let mut changed = raw("https://x/1", "Renamed", "1 minute ago");
    changed.score = "300 points".to_owned();
    let second = IngestPipeline::new(MockExtractor::new(vec![changed]), db.clone());
    let report = second
        .run_at(now() + time::Duration::minutes(5))
        .await
        .expect("ingest");

    assert_eq!(report.persistence, Persistence::Stored { inserted: 0 });
    // The returned list reflects this scrape, the store keeps the first one
    assert_eq!(report.articles[0].title, "Renamed");

    let stored = db
        .get_article("https://x/1")
        .await
        .expect("read")
        .expect("stored");
    assert_eq!(
        stored,
        Article {
            title: "Original".to_owned(),
            link: "https://x/1".to_owned(),
            score: "1 point".to_owned(),
            published_at: Timestamp((NOW - 180) as u64),
        }
    );
    assert_eq!(db.count_articles().await.expect("count"), 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn empty_scrape_skips_insert() {
    let (_dir, db) = temp_db().await;
    let pipeline = IngestPipeline::new(MockExtractor::new(vec![]), db.clone());

    let report = pipeline.run_at(now()).await.expect("ingest");

    assert!(report.articles.is_empty());
    assert_eq!(report.persistence, Persistence::Skipped);
    assert_eq!(db.count_articles().await.expect("count"), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn failed_scrape_is_reported() {
    let (_dir, db) = temp_db().await;
    let pipeline = IngestPipeline::new(MockExtractor::failing(), db.clone());

    let res = pipeline.run_at(now()).await;

    assert!(matches!(res, Err(IngestError::ScrapeFailed { .. })));
    assert_eq!(db.count_articles().await.expect("count"), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn recent_articles_within_window_newest_first() {
    let (_dir, db) = temp_db().await;
    let pipeline = IngestPipeline::new(
        MockExtractor::new(vec![
            raw("https://x/old", "Old", "10 minutes ago"),
            raw("https://x/mid", "Mid", "4 minutes ago"),
            raw("https://x/new", "New", "1 minute ago"),
        ]),
        db,
    );
    pipeline.run_at(now()).await.expect("ingest");

    let recent = pipeline
        .recent_articles_at(Timestamp(NOW as u64))
        .await
        .expect("recent");

    assert_eq!(
        recent.iter().map(|a| a.link.as_str()).collect::<Vec<_>>(),
        vec!["https://x/new", "https://x/mid"]
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn configured_window_is_respected() {
    let (_dir, db) = temp_db().await;
    let pipeline = IngestPipeline::new(
        MockExtractor::new(vec![
            raw("https://x/old", "Old", "10 minutes ago"),
            raw("https://x/new", "New", "1 minute ago"),
        ]),
        db,
    )
    .with_recency_window(Duration::from_secs(15 * 60));
    pipeline.run_at(now()).await.expect("ingest");

    let recent = pipeline
        .recent_articles_at(Timestamp(NOW as u64))
        .await
        .expect("recent");

    assert_eq!(recent.len(), 2);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn feed_serves_stored_articles_when_scrape_fails() {
    let (_dir, db) = temp_db().await;
    db.insert_articles_skip_duplicates(&[Article {
        title: "Stored".to_owned(),
        link: "https://x/stored".to_owned(),
        score: "5 points".to_owned(),
        published_at: Timestamp::now().saturating_sub_secs(60),
    }])
    .await
    .expect("insert");

    let extractor = MockExtractor::failing();
    let pipeline = Arc::new(IngestPipeline::new(extractor.clone(), db));
    let feed = Feed::new(Arc::new(ScrapeCache::new(pipeline, Duration::ZERO)));

    let articles = feed.refresh_recent().await;

    assert_eq!(extractor.calls(), 1);
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Stored");
}

/// Every write fails as if the disk went away; reads serve a fixed list
struct WriteFailingStore {
    stored: Vec<Article>,
    writes: AtomicUsize,
}

#[async_trait]
impl ArticleStore for WriteFailingStore {
    async fn insert_articles_skip_duplicates(&self, _articles: &[Article]) -> DbResult<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(redb::StorageError::Io(io::Error::other("disk full")).into())
    }

    async fn get_articles_published_since(&self, cutoff: Timestamp) -> DbResult<Vec<Article>> {
        Ok(self
            .stored
            .iter()
            .filter(|a| cutoff <= a.published_at)
            .cloned()
            .collect())
    }
}

#[test_log::test(tokio::test)]
async fn storage_failure_still_returns_scraped_articles() {
    let stored = Article {
        title: "Stored".to_owned(),
        link: "https://x/stored".to_owned(),
        score: "5 points".to_owned(),
        published_at: Timestamp::now().saturating_sub_secs(60),
    };
    let store = Arc::new(WriteFailingStore {
        stored: vec![stored.clone()],
        writes: AtomicUsize::new(0),
    });
    let extractor = MockExtractor::new(vec![
        raw("https://x/1", "One", "1 minute ago"),
        raw("https://x/2", "Two", "2 minutes ago"),
        raw("https://x/1", "One again", "3 minutes ago"),
    ]);
    let pipeline = Arc::new(IngestPipeline::new(extractor.clone(), store.clone()));

    let report = pipeline.run_at(now()).await.expect("ingest");

    assert_eq!(report.persistence, Persistence::Failed);
    assert_eq!(
        report
            .articles
            .iter()
            .map(|a| a.title.as_str())
            .collect::<Vec<_>>(),
        vec!["One", "Two", "One again"]
    );
    assert_eq!(report.articles[1].published_at, Timestamp((NOW - 120) as u64));
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);

    // The refresh step swallows the failure and still answers from the store
    let feed = Feed::new(Arc::new(ScrapeCache::new(pipeline, Duration::ZERO)));
    let articles = feed.refresh_recent().await;

    assert_eq!(extractor.calls(), 2);
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    assert_eq!(articles, vec![stored]);
}

fn cache_with(extractor: Arc<MockExtractor>, ttl: Duration, db: Arc<Database>) -> ScrapeCache {
    ScrapeCache::new(Arc::new(IngestPipeline::new(extractor, db)), ttl)
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn cache_coalesces_concurrent_and_recent_scrapes() {
    let (_dir, db) = temp_db().await;
    let extractor = MockExtractor::new(vec![]);
    let cache = cache_with(extractor.clone(), Duration::from_millis(300), db);

    let (a, b) = tokio::join!(cache.ingest(), cache.ingest());
    a.expect("ingest");
    b.expect("ingest");
    assert_eq!(extractor.calls(), 1);

    cache.ingest().await.expect("ingest");
    assert_eq!(extractor.calls(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    cache.ingest().await.expect("ingest");
    assert_eq!(extractor.calls(), 2);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn cache_does_not_remember_failures() {
    let (_dir, db) = temp_db().await;
    let extractor = MockExtractor::failing();
    let cache = cache_with(extractor.clone(), Duration::from_secs(30), db);

    assert!(cache.ingest().await.is_err());
    assert!(cache.ingest().await.is_err());
    assert_eq!(extractor.calls(), 2);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn zero_ttl_scrapes_every_time() {
    let (_dir, db) = temp_db().await;
    let extractor = MockExtractor::new(vec![]);
    let cache = cache_with(extractor.clone(), Duration::ZERO, db);

    let (a, b) = tokio::join!(cache.ingest(), cache.ingest());
    a.expect("ingest");
    b.expect("ingest");
    assert_eq!(extractor.calls(), 2);
}
