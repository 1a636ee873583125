use std::time::Duration;

use newswire_core::RawArticle;
use newswire_core::article::{DEFAULT_RELATIVE_AGE, DEFAULT_SCORE, NO_LINK, NO_TITLE};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, info};
use url::Url;

use crate::LOG_TARGET;

pub const DEFAULT_LISTING_URL: &str = "https://news.ycombinator.com/newest";
pub const DEFAULT_USER_AGENT: &str = concat!("newswire/", env!("CARGO_PKG_VERSION"));

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Snafu)]
pub enum ExtractError {
    #[snafu(display("HTTP request failed: {source}"))]
    Http { source: reqwest::Error },
    #[snafu(display("Listing page returned status {status}"))]
    Status { status: StatusCode },
    #[snafu(display("Invalid selector: {selector}"))]
    SelectorParse { selector: &'static str },
}

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

#[async_trait::async_trait]
pub trait Extractor {
    /// Load the listing page and return its entries in page order
    ///
    /// `Ok(vec![])` means the page had no entries, never that loading failed.
    async fn extract(&self) -> ExtractResult<Vec<RawArticle>>;
}

/// Extractor for the server-rendered Hacker News listing
pub struct HnExtractor {
    client: Client,
    listing_url: Url,
}

impl HnExtractor {
    pub fn new(listing_url: Url, user_agent: &str) -> ExtractResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context(HttpSnafu)?;

        Ok(Self {
            client,
            listing_url,
        })
    }
}

#[async_trait::async_trait]
impl Extractor for HnExtractor {
    async fn extract(&self) -> ExtractResult<Vec<RawArticle>> {
        info!(target: LOG_TARGET, url = %self.listing_url, "Fetching listing page");

        let response = self
            .client
            .get(self.listing_url.clone())
            .send()
            .await
            .context(HttpSnafu)?;

        let status = response.status();
        if !status.is_success() {
            return StatusSnafu { status }.fail();
        }

        let html = response.text().await.context(HttpSnafu)?;
        let articles = extract_articles(&html, &self.listing_url)?;

        debug!(target: LOG_TARGET, count = articles.len(), "Extracted listing entries");
        Ok(articles)
    }
}

fn selector(selector: &'static str) -> ExtractResult<Selector> {
    Selector::parse(selector).map_err(|_| ExtractError::SelectorParse { selector })
}

/// Parse listing entries out of a listing page
///
/// Every `.titleline` element yields one entry. Score and age live in the row
/// right after the one holding the title.
pub fn extract_articles(html: &str, base_url: &Url) -> ExtractResult<Vec<RawArticle>> {
    let document = Html::parse_document(html);

    let titleline_selector = selector(".titleline")?;
    let anchor_selector = selector("a")?;
    let score_selector = selector(".score")?;
    let age_selector = selector(".age > a")?;

    let mut articles = Vec::new();

    for titleline in document.select(&titleline_selector) {
        let mut article = RawArticle::default();

        if let Some(anchor) = titleline.select(&anchor_selector).next() {
            let title = anchor.text().collect::<String>();
            article.title = non_empty_or(title, NO_TITLE);

            let link = anchor
                .value()
                .attr("href")
                .map(|href| resolve_link(href, base_url))
                .unwrap_or_default();
            article.link = non_empty_or(link, NO_LINK);
        }

        if let Some(meta_row) = enclosing_row(titleline).and_then(next_element_sibling) {
            if let Some(score) = meta_row.select(&score_selector).next() {
                article.score = non_empty_or(score.text().collect(), DEFAULT_SCORE);
            }
            if let Some(age) = meta_row.select(&age_selector).next() {
                article.relative_age = non_empty_or(age.text().collect(), DEFAULT_RELATIVE_AGE);
            }
        }

        articles.push(article);
    }

    Ok(articles)
}

fn non_empty_or(s: String, placeholder: &str) -> String {
    if s.is_empty() { placeholder.to_owned() } else { s }
}

/// Absolute links are kept verbatim, relative ones are joined onto the listing URL
fn resolve_link(href: &str, base_url: &Url) -> String {
    match Url::parse(href) {
        Ok(_) => href.to_owned(),
        Err(url::ParseError::RelativeUrlWithoutBase) => base_url
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_owned()),
        Err(_) => href.to_owned(),
    }
}

fn enclosing_row(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "tr")
}

fn next_element_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}
