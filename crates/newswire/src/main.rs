mod cli;
mod watch;

use std::io;
use std::sync::Arc;

use clap::Parser;
use cli::{DevCmd, Opts, OptsCmd, SourceOpts};
use newswire_db::{Database, DbError};
use newswire_ingest::extractor::{ExtractError, Extractor as _};
use newswire_ingest::pipeline::IngestError;
use newswire_ingest::{Feed, HnExtractor, IngestPipeline, Persistence, ScrapeCache};
use newswire_server::{Server, ServerError};
use newswire_util_error::WhateverResult;
use snafu::{FromString, ResultExt, Snafu, Whatever};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "newswire::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Server error: {source}"))]
    Server { source: ServerError },
    #[snafu(display("Extractor error: {source}"))]
    Extract { source: ExtractError },
    #[snafu(display("Ingest error: {source}"))]
    Ingest { source: IngestError },
    #[snafu(display("Miscellaneous error: {source}"))]
    Whatever { source: Whatever },
    #[snafu(display("Data dir error: {source:?}"))]
    DataDir { source: io::Error },
    #[snafu(display("Database error: {source}"))]
    Database { source: DbError },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(WhateverSnafu)?;

    let opts = Opts::parse();
    match handle_cmd(opts).await {
        Ok(v) => {
            if !v.is_null() {
                println!("{}", serde_json::to_string_pretty(&v).expect("Can't fail"));
            }
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    Ok(match opts.cmd {
        OptsCmd::Serve(ref serve_opts) => {
            let pipeline = Arc::new(open_pipeline(&opts.global, &serve_opts.source).await?);
            let cache = Arc::new(ScrapeCache::new(pipeline, serve_opts.scrape_cache_ttl()));
            let feed = Feed::new(cache);

            let server = Server::init(serve_opts.server_opts(), Arc::new(feed))
                .await
                .context(ServerSnafu)?;

            info!(
                target: LOG_TARGET,
                addr = %server.addr().context(ServerSnafu)?,
                source = %serve_opts.source.source_url,
                update_interval_secs = serve_opts.update_interval_secs,
                "Server is running"
            );

            server.run().await.context(ServerSnafu)?;

            serde_json::Value::Null
        }
        OptsCmd::Watch { url } => {
            watch::run(url).await;

            serde_json::Value::Null
        }
        OptsCmd::Dev(ref cmd) => match cmd {
            DevCmd::Scrape { source } => {
                let extractor = make_extractor(source)?;
                let raw = extractor.extract().await.context(ExtractSnafu)?;

                serde_json::to_value(raw).expect("Can't fail")
            }
            DevCmd::Ingest { source } => {
                let pipeline = open_pipeline(&opts.global, source).await?;
                let report = pipeline.run().await.context(IngestSnafu)?;

                let persistence = match report.persistence {
                    Persistence::Skipped => serde_json::json!({ "skipped": true }),
                    Persistence::Stored { inserted } => serde_json::json!({ "inserted": inserted }),
                    Persistence::Failed => serde_json::json!({ "failed": true }),
                };

                serde_json::json!({
                    "persistence": persistence,
                    "articles": report.articles,
                })
            }
            DevCmd::Recent { source } => {
                let pipeline = open_pipeline(&opts.global, source).await?;
                let articles = pipeline.recent_articles().await.context(DatabaseSnafu)?;

                serde_json::to_value(articles).expect("Can't fail")
            }
        },
    })
}

fn make_extractor(source: &SourceOpts) -> CliResult<HnExtractor> {
    HnExtractor::new(source.source_url.clone(), &source.user_agent).context(ExtractSnafu)
}

async fn open_pipeline(global: &cli::GlobalOpts, source: &SourceOpts) -> CliResult<IngestPipeline> {
    let db_path = Database::mk_db_path(global.data_dir())
        .await
        .context(DataDirSnafu)?;
    let db = Database::open(db_path).await.context(DatabaseSnafu)?;

    Ok(
        IngestPipeline::new(Arc::new(make_extractor(source)?), Arc::new(db))
            .with_recency_window(source.recency_window()),
    )
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("Failed to initialize logging".to_string()))?;

    Ok(())
}
