//! Implementation of the `query` subcommand.

use log_data::{iso_to_micros, LogDataAdapter, QueryContext, ReturnElements};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse index bound '{0}': expected a number or an ISO-8601 date-time")]
    InvalidBound(String),

    #[error(transparent)]
    Adapter(#[from] log_data::Error),
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    /// URI of the log to query.
    #[clap(long)]
    uri: String,

    /// Lower index bound, in log order. A number, or an ISO-8601 date-time
    /// for time-indexed logs.
    #[clap(long)]
    start: Option<String>,

    /// Upper index bound, in log order.
    #[clap(long)]
    end: Option<String>,

    /// Comma-separated channel mnemonics to return; the index curve is
    /// always included.
    #[clap(long)]
    mnemonics: Option<String>,

    /// Skip the data and print the header only.
    #[clap(long)]
    header_only: bool,
}

pub async fn command(adapter: &LogDataAdapter, config: Config) -> Result<(), Error> {
    let engine = adapter.config();
    let ctx = QueryContext {
        return_elements: if config.header_only {
            ReturnElements::HeaderOnly
        } else {
            ReturnElements::All
        },
        mnemonics: config
            .mnemonics
            .as_deref()
            .map(|list| list.split(',').map(str::to_string).collect()),
        start_index: parse_bound(config.start.as_deref())?,
        end_index: parse_bound(config.end.as_deref())?,
        request_latest_values: None,
        max_data_nodes: engine.max_data_nodes,
        max_data_points: engine.max_data_points,
    };

    let result = adapter.query_logs(&config.uri, &ctx).await?;

    let header = &result.header;
    println!("log {} ({})", header.uri, header.name);
    match (header.start_index, header.end_index) {
        (Some(start), Some(end)) => println!("  index range: {start} .. {end}"),
        _ => {
            if let (Some(start), Some(end)) = (
                header.start_date_time_index.as_deref(),
                header.end_date_time_index.as_deref(),
            ) {
                println!("  index range: {start} .. {end}");
            }
        }
    }

    if let Some(data) = &result.data {
        println!("  {}", data.mnemonic_list);
        println!("  {}", data.unit_list);
        for row in &data.data {
            println!("  {row}");
        }
        if result.truncated {
            println!("  (truncated by context limits)");
        }
    }
    Ok(())
}

fn parse_bound(bound: Option<&str>) -> Result<Option<f64>, Error> {
    match bound {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .or_else(|| iso_to_micros(raw))
            .map(Some)
            .ok_or_else(|| Error::InvalidBound(raw.to_string())),
    }
}
