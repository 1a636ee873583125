//! Terminal client for a running server

use std::time::Duration;

use futures::StreamExt as _;
use newswire_core::Timestamp;
use newswire_util_error::FmtCompact as _;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "newswire::watch";

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Server messages as a lenient client reads them
///
/// Every field may be missing, and unknown message types are tolerated.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WatchMessage {
    InitialData {
        #[serde(default)]
        recent_articles: Option<Vec<WatchArticle>>,
        #[serde(default)]
        recent_articles_count: Option<usize>,
    },
    ArticleUpdate {
        #[serde(default)]
        articles: Option<Vec<WatchArticle>>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WatchArticle {
    pub title: String,
    pub link: String,
    pub score: String,
    #[serde(default)]
    pub published_at: Option<Timestamp>,
}

/// Connect, print, and reconnect forever
pub async fn run(url: Url) {
    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((mut socket, _)) => {
                info!(target: LOG_TARGET, %url, "Connected");

                while let Some(msg) = socket.next().await {
                    match msg {
                        Ok(Message::Text(text)) => handle_text(text.as_str()),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(err) => {
                            warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Connection error");
                            break;
                        }
                    }
                }

                info!(target: LOG_TARGET, "Disconnected");
            }
            Err(err) => {
                warn!(target: LOG_TARGET, %url, err = %err.fmt_compact(), "Failed to connect");
            }
        }

        debug!(target: LOG_TARGET, delay_secs = RECONNECT_DELAY.as_secs(), "Reconnecting");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

fn handle_text(text: &str) {
    match serde_json::from_str::<WatchMessage>(text) {
        Ok(WatchMessage::InitialData {
            recent_articles: Some(articles),
            recent_articles_count,
        }) => {
            info!(
                target: LOG_TARGET,
                count = recent_articles_count.unwrap_or(articles.len()),
                "Initial data"
            );
            print_articles(&articles);
        }
        Ok(WatchMessage::ArticleUpdate {
            articles: Some(articles),
        }) => {
            info!(target: LOG_TARGET, count = articles.len(), "Article update");
            print_articles(&articles);
        }
        Ok(WatchMessage::InitialData { .. } | WatchMessage::ArticleUpdate { .. }) => {
            debug!(target: LOG_TARGET, "Message without articles");
        }
        Ok(WatchMessage::Unknown) => {
            warn!(target: LOG_TARGET, %text, "Unknown message type received");
        }
        Err(err) => {
            warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Malformed message");
        }
    }
}

fn print_articles(articles: &[WatchArticle]) {
    for article in articles {
        let published_at = article
            .published_at
            .map(|ts| ts.to_string())
            .unwrap_or_else(|| "-".to_owned());
        println!(
            "{published_at}  {:>12}  {}  <{}>",
            article.score, article.title, article.link
        );
    }
}
