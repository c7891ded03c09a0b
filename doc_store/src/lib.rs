//! The document-store collaborator of the channel-data engine.
//!
//! The engine stores everything — chunk documents, log headers, transaction
//! rollback records — as JSON documents in named collections. This crate
//! defines the small filter surface the engine needs (case-insensitive
//! equality for URIs, numeric bound comparisons on nested fields, and/or
//! composition, sorting by a nested field), the [`DocumentStore`] trait, and
//! two implementations: an in-memory store and a JSON-file-backed store used
//! by the admin CLI.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use async_trait::async_trait;
use serde_json::Value;
use snafu::Snafu;
use std::fmt::Debug;

mod file;
mod filter;
mod mem;
mod transaction;

pub use file::*;
pub use filter::*;
pub use mem::*;
pub use transaction::*;

/// Errors raised by store implementations.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("error serializing document: {source}"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("error loading store file {path}: {source}"))]
    Load {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("error persisting store file {path}: {source}"))]
    Persist {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("store file {path} is not valid JSON: {source}"))]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },
}

/// Store result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A document-oriented store: named collections of JSON documents.
///
/// A query that matches nothing returns an empty vector, never an error.
#[async_trait]
pub trait DocumentStore: Debug + Send + Sync {
    /// Append `document` to `collection`.
    async fn insert(&self, collection: &str, document: Value) -> Result<()>;

    /// All documents of `collection` matching `filter`, optionally sorted.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&SortKey>,
    ) -> Result<Vec<Value>>;

    /// Replace every document matching `filter` with `document`, returning
    /// the number replaced.
    async fn update(&self, collection: &str, filter: &Filter, document: Value) -> Result<u64>;

    /// Delete every document matching `filter`, returning the number
    /// deleted.
    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64>;
}
