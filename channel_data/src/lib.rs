//! The channel-data engine.
//!
//! A log's data is an ordered stream of multi-channel rows keyed by a
//! primary index (depth, or time as epoch microseconds). This crate owns the
//! record model and the three transformations the storage engine is built
//! from:
//!
//! * [`ChannelDataReader`] parses a payload or a fetched chunk sequence into
//!   an ordered, forward-only record stream with per-channel metadata;
//! * [`RecordMerger`] merges an existing stream with an incoming one under
//!   an update range, with overwrite and clearing semantics;
//! * [`RecordChunker`] splits a record stream into storage chunks aligned to
//!   a configured extent size, validating index order as it goes.
//!
//! The reader is the only component that parses chunk `data` payloads;
//! everything downstream works on [`ChannelDataRecord`]s.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use snafu::Snafu;

mod chunker;
mod merger;
mod reader;
mod record;

pub use chunker::*;
pub use merger::*;
pub use reader::*;
pub use record::*;

/// Errors of the channel-data engine.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("duplicate primary index value {value}"))]
    DuplicateIndex { value: f64 },

    #[snafu(display("primary index out of order: {current} after {previous}"))]
    IndexOutOfOrder { previous: f64, current: f64 },

    #[snafu(display("invalid range: {reason}"))]
    InvalidRange { reason: String },

    #[snafu(display(
        "unit mismatch for channel '{mnemonic}': stored '{existing}', incoming '{incoming}'"
    ))]
    UnitMismatch {
        mnemonic: String,
        existing: String,
        incoming: String,
    },

    #[snafu(display("malformed record payload: {source}"))]
    Payload { source: serde_json::Error },
}

/// Engine result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
