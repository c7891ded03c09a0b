//! The log adapter: channel-data operations surfaced for WITSML log objects.
//!
//! The adapter sits between the protocol layer (out of scope here) and the
//! chunk engine. It owns the log header documents, keeps their per-curve and
//! log-level index ranges consistent with the stored chunks, slices query
//! results by mnemonic, enforces the context limits, and mediates
//! transactions around multi-document writes.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use snafu::Snafu;

mod adapter;
mod header;
mod query;

pub use adapter::*;
pub use header::*;
pub use query::*;

/// One day in microseconds, the default extent for time-indexed logs.
const DAY_MICROS: f64 = 86_400_000_000.0;

/// Engine configuration shared by all adapters.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Chunk extent size for depth-indexed logs, in index units.
    pub depth_range_size: f64,

    /// Chunk extent size for time-indexed logs, in microseconds.
    pub time_range_size: f64,

    /// Upper bound on rows returned by one query.
    pub max_data_nodes: usize,

    /// Upper bound on values returned by one query.
    pub max_data_points: usize,

    /// Emit the primary index alongside channels in metadata enumerations.
    pub stream_index_value_pairs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth_range_size: 1000.0,
            time_range_size: DAY_MICROS,
            max_data_nodes: 10_000,
            max_data_points: 500_000,
            stream_index_value_pairs: false,
        }
    }
}

impl EngineConfig {
    /// The configured extent size for the given index type.
    pub fn range_size(&self, is_time_index: bool) -> f64 {
        if is_time_index {
            self.time_range_size
        } else {
            self.depth_range_size
        }
    }
}

/// Errors of the log adapter.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("log {uri} does not exist"))]
    NotFound { uri: String },

    #[snafu(display("invalid range: {reason}"))]
    InvalidRange { reason: String },

    // Engine validation errors surface unchanged.
    #[snafu(context(false), display("{source}"))]
    Engine { source: channel_data::Error },

    #[snafu(display("error reading log data: {source}"))]
    Read { source: chunk_store::Error },

    #[snafu(display("error updating log data: {source}"))]
    Update { source: chunk_store::Error },

    #[snafu(display("error deleting log data: {source}"))]
    Delete { source: chunk_store::Error },

    #[snafu(display("error accessing log headers: {source}"))]
    Header { source: doc_store::Error },

    #[snafu(display("error saving transaction records: {source}"))]
    Transaction { source: doc_store::Error },

    #[snafu(display("error decoding log header: {source}"))]
    DecodeHeader { source: serde_json::Error },

    #[snafu(display("error encoding log header: {source}"))]
    EncodeHeader { source: serde_json::Error },
}

/// Adapter result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
