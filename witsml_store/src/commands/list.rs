//! Implementation of the `list` subcommand.

use log_data::LogDataAdapter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Adapter(#[from] log_data::Error),
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    /// Query-string filter over header fields, e.g. `uidWell=w1&name=run4`.
    #[clap(long)]
    filter: Option<String>,
}

pub async fn command(adapter: &LogDataAdapter, config: Config) -> Result<(), Error> {
    let headers = adapter.list_logs(config.filter.as_deref()).await?;
    if headers.is_empty() {
        println!("no logs stored");
        return Ok(());
    }
    for header in headers {
        let curves = header.log_curve_info.len();
        println!("{}\t{}\t{} curve(s)", header.uri, header.name, curves);
    }
    Ok(())
}
