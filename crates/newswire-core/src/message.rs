use serde::{Deserialize, Serialize};

use crate::Article;

/// Messages pushed from the server to feed clients, one per text frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent exactly once, right after the connection opens
    InitialData {
        recent_articles: Vec<Article>,
        recent_articles_count: usize,
    },
    /// Sent on every tick of the connection's update timer
    ArticleUpdate { articles: Vec<Article> },
}

impl ServerMessage {
    pub fn initial_data(recent_articles: Vec<Article>) -> Self {
        Self::InitialData {
            recent_articles_count: recent_articles.len(),
            recent_articles,
        }
    }

    pub fn article_update(articles: Vec<Article>) -> Self {
        Self::ArticleUpdate { articles }
    }

    pub fn articles(&self) -> &[Article] {
        match self {
            ServerMessage::InitialData {
                recent_articles, ..
            } => recent_articles,
            ServerMessage::ArticleUpdate { articles } => articles,
        }
    }
}
