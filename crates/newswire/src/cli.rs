use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use newswire_ingest::extractor::{DEFAULT_LISTING_URL, DEFAULT_USER_AGENT};
use url::Url;

/// Scrapes the newest Hacker News submissions and pushes them to websocket clients
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory holding the article database
    #[arg(env = "NEWSWIRE_DATA_DIR", long, global = true)]
    pub data_dir: Option<PathBuf>,
}

static PROJECTS_DIR: LazyLock<directories::ProjectDirs> = LazyLock::new(|| {
    directories::ProjectDirs::from("org", "Newswire", "newswire")
        .expect("Unable to determine project's dir")
});

impl GlobalOpts {
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_deref().unwrap_or_else(|| {
            PROJECTS_DIR
                .state_dir()
                .unwrap_or_else(|| PROJECTS_DIR.data_local_dir())
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Run the websocket server
    Serve(ServeOpts),

    /// Connect to a running server and print what it pushes
    Watch {
        #[arg(long, default_value = "ws://localhost:3001")]
        url: Url,
    },

    /// Development and debugging commands
    #[command(subcommand)]
    Dev(DevCmd),
}

/// Where and how to scrape
#[derive(Debug, Args)]
pub struct SourceOpts {
    /// Listing page to scrape
    #[arg(long, default_value = DEFAULT_LISTING_URL, env = "NEWSWIRE_SOURCE_URL")]
    pub source_url: Url,

    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "NEWSWIRE_USER_AGENT")]
    pub user_agent: String,

    /// How far back an article counts as recent
    #[arg(long, default_value = "300", env = "NEWSWIRE_RECENCY_WINDOW_SECS")]
    pub recency_window_secs: u64,
}

impl SourceOpts {
    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }
}

#[derive(Debug, Args)]
pub struct ServeOpts {
    #[arg(long, default_value_t = newswire_server::DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED), env = "NEWSWIRE_HOST")]
    pub host: IpAddr,

    /// Set SO_REUSEPORT
    #[arg(long, env = "NEWSWIRE_REUSEPORT")]
    pub reuseport: bool,

    /// Seconds between updates pushed to each client
    #[arg(
        long,
        default_value = "300",
        env = "NEWSWIRE_UPDATE_INTERVAL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub update_interval_secs: u64,

    /// Reuse a scrape this many seconds old; 0 scrapes on every refresh
    #[arg(long, default_value = "30", env = "NEWSWIRE_SCRAPE_CACHE_SECS")]
    pub scrape_cache_secs: u64,

    #[command(flatten)]
    pub source: SourceOpts,
}

impl ServeOpts {
    pub fn server_opts(&self) -> newswire_server::Opts {
        newswire_server::Opts::new(
            SocketAddr::new(self.host, self.port),
            self.reuseport,
            Duration::from_secs(self.update_interval_secs),
        )
    }

    pub fn scrape_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scrape_cache_secs)
    }
}

#[derive(Debug, Subcommand)]
pub enum DevCmd {
    /// Scrape the listing page once and print the raw entries
    Scrape {
        #[command(flatten)]
        source: SourceOpts,
    },
    /// Run one ingest pass and print its report
    Ingest {
        #[command(flatten)]
        source: SourceOpts,
    },
    /// Print the stored articles within the recency window
    Recent {
        #[command(flatten)]
        source: SourceOpts,
    },
}
