//! Implementation of the `write` subcommand.

use channel_data::ChannelDataReader;
use data_types::{split_list, ChannelIndex, Direction};
use log_data::{LogCurveInfo, LogDataAdapter, LogHeader, LogIndexType, LogShape};
use observability_deps::tracing::info;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read payload file {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid payload file: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid channel data: {0}")]
    ChannelData(#[from] channel_data::Error),

    #[error(transparent)]
    Adapter(#[from] log_data::Error),
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    /// URI of the target log.
    #[clap(long)]
    uri: String,

    /// Path of the JSON payload file.
    #[clap(long)]
    file: PathBuf,
}

/// A channel-data payload: the shared column lists plus a row array whose
/// first element per row is the primary index value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uid_well: Option<String>,
    #[serde(default)]
    uid_wellbore: Option<String>,

    #[serde(default = "default_index_type")]
    index_type: LogIndexType,
    #[serde(default = "default_direction")]
    direction: Direction,
    #[serde(default)]
    utc_offset_seconds: Option<i32>,

    mnemonic_list: String,
    unit_list: String,
    null_value_list: String,
    data: Vec<Vec<serde_json::Value>>,
}

fn default_index_type() -> LogIndexType {
    LogIndexType::Depth
}

fn default_direction() -> Direction {
    Direction::Increasing
}

pub async fn command(adapter: &LogDataAdapter, config: Config) -> Result<(), Error> {
    let raw = tokio::fs::read(&config.file)
        .await
        .map_err(|source| Error::ReadFile {
            path: config.file.display().to_string(),
            source,
        })?;
    let payload: Payload = serde_json::from_slice(&raw)?;

    let mnemonics = split_list(&payload.mnemonic_list);
    let units = split_list(&payload.unit_list);
    let null_values = split_list(&payload.null_value_list);

    // First write creates the header.
    let header = match adapter.get_header(&config.uri).await? {
        Some(header) => header,
        None => {
            let header =
                header_from_payload(&config.uri, &payload, &mnemonics, &units, &null_values);
            adapter.add_log(&header).await?;
            header
        }
    };

    let mut index = ChannelIndex::new(
        header.primary_mnemonic(),
        units.first().cloned().unwrap_or_default(),
        header.direction,
        header.is_time_index(),
    );
    index.utc_offset_seconds = payload.utc_offset_seconds;

    let reader = ChannelDataReader::new(
        config.uri.clone(),
        mnemonics,
        units,
        null_values,
        vec![index],
        &serde_json::to_string(&payload.data)?,
    )?;

    let rows = reader.len();
    adapter.update_data(&config.uri, vec![reader]).await?;
    info!(uri = %config.uri, rows, "write applied");
    println!("wrote {} row(s) to {}", rows, config.uri);
    Ok(())
}

fn header_from_payload(
    uri: &str,
    payload: &Payload,
    mnemonics: &[String],
    units: &[String],
    null_values: &[String],
) -> LogHeader {
    let index_curve = mnemonics.first().cloned().unwrap_or_default();
    let log_curve_info = mnemonics
        .iter()
        .zip(units)
        .zip(null_values)
        .map(|((mnemonic, unit), null_value)| LogCurveInfo {
            null_value: (!null_value.is_empty()).then(|| null_value.clone()),
            ..LogCurveInfo::new(mnemonic.clone(), unit.clone())
        })
        .collect();

    LogHeader {
        uid: payload
            .uid
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        uri: uri.to_string(),
        name: payload.name.clone().unwrap_or_default(),
        uid_well: payload.uid_well.clone().unwrap_or_default(),
        uid_wellbore: payload.uid_wellbore.clone().unwrap_or_default(),
        index_type: payload.index_type,
        direction: payload.direction,
        index_curve,
        start_index: None,
        end_index: None,
        start_date_time_index: None,
        end_date_time_index: None,
        log_curve_info,
    }
}
