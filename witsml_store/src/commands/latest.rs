//! Implementation of the `latest` subcommand.

use log_data::{LogDataAdapter, QueryContext, ReturnElements};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Adapter(#[from] log_data::Error),
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    /// URI of the log to query.
    #[clap(long)]
    uri: String,

    /// How many values to return per channel.
    #[clap(long, default_value = "1")]
    count: usize,

    /// Comma-separated channel mnemonics to return; the index curve is
    /// always included.
    #[clap(long)]
    mnemonics: Option<String>,
}

pub async fn command(adapter: &LogDataAdapter, config: Config) -> Result<(), Error> {
    let engine = adapter.config();
    let ctx = QueryContext {
        return_elements: ReturnElements::All,
        mnemonics: config
            .mnemonics
            .as_deref()
            .map(|list| list.split(',').map(str::to_string).collect()),
        start_index: None,
        end_index: None,
        request_latest_values: Some(config.count),
        max_data_nodes: engine.max_data_nodes,
        max_data_points: engine.max_data_points,
    };

    let result = adapter.query_logs(&config.uri, &ctx).await?;

    match &result.data {
        Some(data) => {
            println!("{}", data.mnemonic_list);
            println!("{}", data.unit_list);
            // Rows arrive in reversed log order, newest first.
            for row in &data.data {
                println!("{row}");
            }
            if result.truncated {
                println!("(truncated by context limits)");
            }
        }
        None => println!("no data stored for {}", config.uri),
    }
    Ok(())
}
