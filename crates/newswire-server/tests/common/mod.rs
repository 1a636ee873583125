#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use newswire_core::ServerMessage;
use newswire_server::{Opts, Server, SharedFeed, SharedState};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A server on a random local port, stopped when dropped
pub struct TestServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(feed: SharedFeed, update_interval: Duration) -> Self {
        let opts = Opts::new(SocketAddr::from(([127, 0, 0, 1], 0)), false, update_interval);

        let server = Server::init(opts, feed)
            .await
            .expect("Failed to start test server");
        let addr = server.addr().expect("Bound");
        let state = server.state().clone();

        let (shutdown, shutdown_rx) = oneshot::channel();
        tokio::spawn(server.run_until(async {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            state,
            shutdown: Some(shutdown),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub async fn connect(&self, path: &str) -> TestSocket {
        let (socket, _) = tokio_tungstenite::connect_async(self.ws_url(path))
            .await
            .expect("websocket connect");
        socket
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Next server message, skipping control frames
pub async fn next_message(socket: &mut TestSocket, wait: Duration) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(wait, socket.next())
            .await
            .expect("message in time")
            .expect("socket open")
            .expect("no transport error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("valid message");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    }
}

pub fn shared<F>(feed: F) -> SharedFeed
where
    F: newswire_server::ArticleFeed + Send + Sync + 'static,
{
    Arc::new(feed)
}
