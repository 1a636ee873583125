//! Scraping the listing page and keeping the article store up to date
//!
//! * [`extractor`] fetches and parses the listing page,
//! * [`pipeline`] normalizes and stores what was found, and answers the
//!   recency query,
//! * [`cache`] lets concurrent callers share one scrape,
//! * [`feed`] glues the above into the "refresh, then read recent" step the
//!   broadcast loop runs on every tick.

pub mod cache;
pub mod extractor;
pub mod feed;
pub mod pipeline;

pub use self::cache::ScrapeCache;
pub use self::extractor::{Extractor, HnExtractor};
pub use self::feed::Feed;
pub use self::pipeline::{ArticleStore, IngestPipeline, IngestReport, Persistence};

pub const LOG_TARGET: &str = "newswire::ingest";
