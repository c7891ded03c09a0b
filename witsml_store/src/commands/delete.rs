//! Implementation of the `delete-log` subcommand.

use log_data::LogDataAdapter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Adapter(#[from] log_data::Error),
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    /// URI of the log to delete.
    #[clap(long)]
    uri: String,
}

pub async fn command(adapter: &LogDataAdapter, config: Config) -> Result<(), Error> {
    adapter.delete_log(&config.uri).await?;
    println!("deleted {}", config.uri);
    Ok(())
}
