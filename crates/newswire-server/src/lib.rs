mod routes;
pub mod session;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use newswire_core::Article;
use newswire_ingest::Feed;
use snafu::Snafu;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::info;

pub const LOG_TARGET: &str = "newswire::server";

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Source of the articles pushed to clients
#[async_trait::async_trait]
pub trait ArticleFeed {
    /// Refresh from the source if needed, and return the recent articles
    ///
    /// Failures are the feed's business: it logs them and returns whatever it
    /// still has, possibly nothing.
    async fn refresh_recent(&self) -> Vec<Article>;
}

#[async_trait::async_trait]
impl ArticleFeed for Feed {
    async fn refresh_recent(&self) -> Vec<Article> {
        Feed::refresh_recent(self).await
    }
}

pub type SharedFeed = Arc<dyn ArticleFeed + Send + Sync>;

#[derive(Clone, Debug)]
pub struct Opts {
    pub listen: SocketAddr,
    pub reuseport: bool,
    pub update_interval: Duration,
}

impl Opts {
    pub fn new(listen: SocketAddr, reuseport: bool, update_interval: Duration) -> Self {
        Self {
            listen,
            reuseport,
            update_interval,
        }
    }
}

pub struct AppState {
    feed: SharedFeed,
    update_interval: Duration,
    local_addr: SocketAddr,
    next_connection_id: AtomicU64,
    connections: AtomicUsize,
}

impl AppState {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    fn open_connection(&self) -> ConnectionGuard<'_> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { id, state: self }
    }
}

/// Counts as an open connection until dropped
struct ConnectionGuard<'s> {
    id: u64,
    state: &'s AppState,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.state.connections.fetch_sub(1, Ordering::Relaxed);
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Snafu)]
pub enum ServerError {
    #[snafu(transparent)]
    IO { source: io::Error },
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

pub struct Server {
    listener: TcpListener,
    state: SharedState,
}

impl Server {
    pub async fn init(opts: Opts, feed: SharedFeed) -> ServerResult<Server> {
        let listener = Self::get_listener(&opts).await?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(AppState {
            feed,
            update_interval: opts.update_interval,
            local_addr,
            next_connection_id: AtomicU64::new(0),
            connections: AtomicUsize::new(0),
        });

        info!(target: LOG_TARGET, "Listening on {local_addr}");
        Ok(Self { listener, state })
    }

    pub async fn get_listener(opts: &Opts) -> ServerResult<TcpListener> {
        let socket = {
            let addr = opts.listen;

            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            if opts.reuseport {
                #[cfg(unix)]
                socket.set_reuseport(true)?;
            }
            socket.set_nodelay(true)?;

            socket.bind(addr)?;

            socket
        };

        Ok(socket.listen(1024)?)
    }

    pub fn addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ServerResult<()> {
        let router = Router::new()
            .merge(routes::route_handler(self.state.clone()))
            .layer(CorsLayer::permissive());

        info!(target: LOG_TARGET, "Starting server");
        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target: LOG_TARGET, "Shutting down");
}
