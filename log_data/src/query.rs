//! Query context, projection and result shapes for log data retrieval.

use crate::{micros_to_iso, LogHeader};
use channel_data::ChannelDataRecord;
use serde::Serialize;
use serde_json::Value;

/// Which parts of a log a query wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnElements {
    /// The full header plus data.
    All,
    /// Identity and parent ids only.
    IdOnly,
    /// Header without data.
    HeaderOnly,
    /// Identity plus data.
    DataOnly,
    /// Echo what was asked for; element-level trimming is the protocol
    /// layer's concern.
    Requested,
}

impl ReturnElements {
    /// Does this projection include channel data?
    pub fn includes_data(&self) -> bool {
        !matches!(self, Self::IdOnly | Self::HeaderOnly)
    }
}

/// Per-request settings for [`query_logs`](crate::LogDataAdapter::query_logs).
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Projection of the result.
    pub return_elements: ReturnElements,

    /// Requested channel mnemonics; `None` asks for all. The primary index
    /// is always included.
    pub mnemonics: Option<Vec<String>>,

    /// Lower query bound, in log order (epoch microseconds for time logs).
    pub start_index: Option<f64>,

    /// Upper query bound, in log order.
    pub end_index: Option<f64>,

    /// Return only the latest `n` values per channel, iterating the log in
    /// reversed direction.
    pub request_latest_values: Option<usize>,

    /// Row limit for this request; the engine configuration caps it.
    pub max_data_nodes: usize,

    /// Value limit for this request; the engine configuration caps it.
    pub max_data_points: usize,
}

impl QueryContext {
    /// A context returning everything, bounded by the given limits.
    pub fn all(max_data_nodes: usize, max_data_points: usize) -> Self {
        Self {
            return_elements: ReturnElements::All,
            mnemonics: None,
            start_index: None,
            end_index: None,
            request_latest_values: None,
            max_data_nodes,
            max_data_points,
        }
    }
}

/// Channel data attached to a query result, WITSML `logData` style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogData {
    /// Comma-joined mnemonics of the returned columns.
    pub mnemonic_list: String,

    /// Comma-joined units of the returned columns.
    pub unit_list: String,

    /// Comma-joined rows, index first; nulls render empty.
    pub data: Vec<String>,
}

/// One log returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryResult {
    /// The (projected) header, curve ranges echoing the returned slice.
    pub header: LogHeader,

    /// Channel data, when the projection asked for it and any was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LogData>,

    /// Set when a context limit cut the result short.
    pub truncated: bool,
}

/// One channel's metadata, as enumerated for streaming consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMetadata {
    /// Channel mnemonic.
    pub mnemonic: String,

    /// Unit of measure.
    pub unit: String,

    /// Null sentinel, if the channel declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_value: Option<String>,

    /// Is this the primary index curve?
    pub is_index: bool,
}

/// Render one record as a comma-joined row.
///
/// The index is formatted first (ISO-8601 for time logs, plain number
/// otherwise); null channel values render as empty fields so column arity
/// is preserved.
pub(crate) fn format_row(
    record: &ChannelDataRecord,
    is_time_index: bool,
    utc_offset_seconds: Option<i32>,
) -> String {
    let mut fields = Vec::with_capacity(record.values().len());
    for (col, value) in record.values().iter().enumerate() {
        if col == 0 {
            if is_time_index {
                fields.push(
                    micros_to_iso(record.index(), utc_offset_seconds).unwrap_or_default(),
                );
            } else {
                fields.push(format_value(value));
            }
        } else if record.is_null(col) {
            fields.push(String::new());
        } else {
            fields.push(format_value(value));
        }
    }
    fields.join(",")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strip a header down to what the projection allows.
pub(crate) fn project_header(header: &LogHeader, return_elements: ReturnElements) -> LogHeader {
    match return_elements {
        ReturnElements::IdOnly | ReturnElements::DataOnly => LogHeader {
            uid: header.uid.clone(),
            uri: header.uri.clone(),
            name: header.name.clone(),
            uid_well: header.uid_well.clone(),
            uid_wellbore: header.uid_wellbore.clone(),
            index_type: header.index_type,
            direction: header.direction,
            index_curve: header.index_curve.clone(),
            start_index: None,
            end_index: None,
            start_date_time_index: None,
            end_date_time_index: None,
            log_curve_info: vec![],
        },
        ReturnElements::All | ReturnElements::HeaderOnly | ReturnElements::Requested => {
            header.clone()
        }
    }
}
