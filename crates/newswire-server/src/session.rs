//! One connected client
//!
//! A [`Session`] owns everything a connection needs: the outgoing half, the
//! incoming half, and the update timer. Dropping the session (which
//! [`Session::run`] does when it returns) releases all of it.
//!
//! The session pushes `initialData` right away, then `articleUpdate` once per
//! update interval. Inbound data frames are read only to notice the peer
//! going away.

use std::convert::Infallible;
use std::error;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt as _, Stream, StreamExt as _};
use newswire_core::{Article, ServerMessage};
use newswire_util_error::FmtCompact as _;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace, warn};

use crate::{LOG_TARGET, SharedFeed};

/// What the session cares about in an incoming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Data,
    Close,
}

impl From<Message> for Inbound {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Close(_) => Self::Close,
            _ => Self::Data,
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ClientClosed,
    TransportError,
    SendFailed,
}

pub struct Session<Tx, Rx> {
    id: u64,
    feed: SharedFeed,
    update_interval: Duration,
    tx: Tx,
    rx: Rx,
}

impl<Tx, Rx, E> Session<Tx, Rx>
where
    Tx: Sink<String> + Unpin,
    Tx::Error: error::Error,
    Rx: Stream<Item = Result<Inbound, E>> + Unpin,
    E: error::Error,
{
    pub fn new(id: u64, feed: SharedFeed, update_interval: Duration, tx: Tx, rx: Rx) -> Self {
        Self {
            id,
            feed,
            update_interval,
            tx,
            rx,
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        let Err(end) = self.run_inner().await;
        end
    }

    async fn run_inner(&mut self) -> Result<Infallible, SessionEnd> {
        let articles = self.refresh().await?;
        debug!(
            target: LOG_TARGET,
            conn_id = self.id,
            count = articles.len(),
            "Sending initial data"
        );
        self.send(ServerMessage::initial_data(articles)).await?;

        let mut ticker = interval_at(
            Instant::now() + self.update_interval,
            self.update_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let articles = self.refresh().await?;
                    debug!(
                        target: LOG_TARGET,
                        conn_id = self.id,
                        count = articles.len(),
                        "Sending article update"
                    );
                    self.send(ServerMessage::article_update(articles)).await?;
                }
                inbound = self.rx.next() => self.handle_inbound(inbound)?,
            }
        }
    }

    /// Run the feed on its own task while watching the connection
    ///
    /// If the client goes away first, the refresh still runs to completion
    /// and its result is dropped.
    async fn refresh(&mut self) -> Result<Vec<Article>, SessionEnd> {
        let feed = self.feed.clone();
        let mut refresh = tokio::spawn(async move { feed.refresh_recent().await });

        loop {
            tokio::select! {
                res = &mut refresh => {
                    return Ok(res.unwrap_or_else(|err| {
                        warn!(
                            target: LOG_TARGET,
                            conn_id = self.id,
                            err = %err.fmt_compact(),
                            "Feed refresh task failed"
                        );
                        vec![]
                    }));
                }
                inbound = self.rx.next() => self.handle_inbound(inbound)?,
            }
        }
    }

    fn handle_inbound(&self, inbound: Option<Result<Inbound, E>>) -> Result<(), SessionEnd> {
        match inbound {
            Some(Ok(Inbound::Data)) => {
                trace!(target: LOG_TARGET, conn_id = self.id, "Ignoring inbound frame");
                Ok(())
            }
            Some(Ok(Inbound::Close)) | None => Err(SessionEnd::ClientClosed),
            Some(Err(err)) => {
                debug!(target: LOG_TARGET, conn_id = self.id, err = %err.fmt_compact(), "Transport error");
                Err(SessionEnd::TransportError)
            }
        }
    }

    async fn send(&mut self, msg: ServerMessage) -> Result<(), SessionEnd> {
        let text = serde_json::to_string(&msg).expect("Can't fail");

        self.tx.send(text).await.map_err(|err| {
            debug!(target: LOG_TARGET, conn_id = self.id, err = %err.fmt_compact(), "Send failed");
            SessionEnd::SendFailed
        })
    }
}
