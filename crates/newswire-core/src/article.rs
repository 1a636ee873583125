use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Timestamp;
use crate::relative_time::parse_relative_time;

pub const NO_TITLE: &str = "No title";
pub const NO_LINK: &str = "No link";
pub const DEFAULT_SCORE: &str = "0 points";
pub const DEFAULT_RELATIVE_AGE: &str = "0 minutes ago";

/// A listing entry as found on the page, before any normalization
///
/// Missing fields are already replaced with their placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub title: String,
    pub link: String,
    pub score: String,
    /// E.g. `"3 minutes ago"`
    pub relative_age: String,
}

impl Default for RawArticle {
    fn default() -> Self {
        Self {
            title: NO_TITLE.to_owned(),
            link: NO_LINK.to_owned(),
            score: DEFAULT_SCORE.to_owned(),
            relative_age: DEFAULT_RELATIVE_AGE.to_owned(),
        }
    }
}

impl RawArticle {
    /// Resolve the relative age against `now`
    pub fn into_article(self, now: OffsetDateTime) -> Article {
        let published_at = Timestamp::from(parse_relative_time(&self.relative_age, now));
        Article {
            title: self.title,
            link: self.link,
            score: self.score,
            published_at,
        }
    }
}

/// A normalized article, as stored and as pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    /// Natural identity; never validated as an URL
    pub link: String,
    /// Free text, e.g. `"123 points"`
    pub score: String,
    pub published_at: Timestamp,
}
