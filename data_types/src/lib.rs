//! Shared data types for the WITSML channel-data store.
//!
//! Everything that is persisted or passed between the engine crates lives
//! here: index directions, scalar index ranges and the aligned-extent
//! arithmetic that chunking is built on, channel index descriptors, and the
//! [`ChannelDataChunk`] document itself.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

mod chunk;
mod range;

pub use chunk::*;
pub use range::*;
