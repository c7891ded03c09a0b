//! Admin CLI for the WITSML channel-data store.
//!
//! Wires the construction graph explicitly — file-backed document store,
//! chunk engine configuration, log adapter — and exposes the engine
//! operations as subcommands against a store file.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use clap::Parser;
use doc_store::FileStore;
use dotenvy::dotenv;
use log_data::{EngineConfig, LogDataAdapter};
use observability_deps::tracing::{self, debug};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{fmt, EnvFilter};

mod commands {
    pub mod delete;
    pub mod latest;
    pub mod list;
    pub mod query;
    pub mod write;
}

#[derive(Debug, Parser)]
#[clap(
    name = "witsml_store",
    about = "WITSML channel-data store admin CLI",
    long_about = "Stores and serves WITSML channel data (logs) as fixed-extent \
    chunks in a document store.\n\nConfiguration options below can be set either \
    with the command line flags or with the specified environment variable. If \
    there is a file named '.env' in the current working directory, it is sourced \
    before loading the configuration."
)]
struct Config {
    /// Path of the JSON store file.
    #[clap(
        long = "store-path",
        env = "WITSML_STORE_PATH",
        default_value = "witsml-store.json",
        global = true
    )]
    store_path: PathBuf,

    /// Chunk extent size for depth-indexed logs.
    #[clap(
        long = "depth-chunk-size",
        env = "WITSML_DEPTH_CHUNK_SIZE",
        default_value = "1000",
        global = true
    )]
    depth_chunk_size: f64,

    /// Chunk extent size for time-indexed logs, in microseconds.
    #[clap(
        long = "time-chunk-size",
        env = "WITSML_TIME_CHUNK_SIZE",
        default_value = "86400000000",
        global = true
    )]
    time_chunk_size: f64,

    /// Upper bound on rows returned by one query.
    #[clap(
        long = "max-data-nodes",
        env = "WITSML_MAX_DATA_NODES",
        default_value = "10000",
        global = true
    )]
    max_data_nodes: usize,

    /// Upper bound on values returned by one query.
    #[clap(
        long = "max-data-points",
        env = "WITSML_MAX_DATA_POINTS",
        default_value = "500000",
        global = true
    )]
    max_data_points: usize,

    /// Emit index/value pairs in metadata enumerations.
    #[clap(
        long = "stream-index-value-pairs",
        env = "WITSML_STREAM_INDEX_VALUE_PAIRS",
        global = true
    )]
    stream_index_value_pairs: bool,

    /// Logging filter, tracing-subscriber `EnvFilter` syntax.
    #[clap(
        long = "log-filter",
        env = "LOG_FILTER",
        default_value = "warn",
        global = true
    )]
    log_filter: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Apply a channel-data payload to a log, creating it on first write.
    Write(commands::write::Config),

    /// Query a log's header and data.
    Query(commands::query::Config),

    /// Return the latest values per channel, newest first.
    Latest(commands::latest::Config),

    /// Delete a log and all of its chunks.
    DeleteLog(commands::delete::Config),

    /// List stored log headers.
    List(commands::list::Config),
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("cannot open store: {0}")]
    OpenStore(#[from] doc_store::Error),

    #[error(transparent)]
    Write(#[from] commands::write::Error),

    #[error(transparent)]
    Query(#[from] commands::query::Error),

    #[error(transparent)]
    Latest(#[from] commands::latest::Error),

    #[error(transparent)]
    Delete(#[from] commands::delete::Error),

    #[error(transparent)]
    List(#[from] commands::list::Error),
}

#[tokio::main]
async fn main() {
    // Source the .env file before parsing, so env-backed flags see it.
    let _ = dotenv();
    let config = Config::parse();

    init_logging(&config.log_filter);

    if let Err(e) = run(config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(filter: &str) {
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run(config: Config) -> Result<(), Error> {
    let engine_config = EngineConfig {
        depth_range_size: config.depth_chunk_size,
        time_range_size: config.time_chunk_size,
        max_data_nodes: config.max_data_nodes,
        max_data_points: config.max_data_points,
        stream_index_value_pairs: config.stream_index_value_pairs,
    };
    debug!(?engine_config, store_path = %config.store_path.display(), "starting");

    let store = Arc::new(FileStore::open(&config.store_path).await?);
    let adapter = LogDataAdapter::new(store, engine_config);

    match config.command {
        Command::Write(c) => commands::write::command(&adapter, c).await?,
        Command::Query(c) => commands::query::command(&adapter, c).await?,
        Command::Latest(c) => commands::latest::command(&adapter, c).await?,
        Command::DeleteLog(c) => commands::delete::command(&adapter, c).await?,
        Command::List(c) => commands::list::command(&adapter, c).await?,
    }
    Ok(())
}
