//! Persistence of [`ChannelDataChunk`] documents in the document store.
//!
//! All chunk traffic goes through [`ChunkStore`]: range-filtered retrieval
//! sorted by the primary index, insert-or-update bulk writes, and the
//! cascade delete that runs when a log is removed. Store failures surface as
//! read/write/delete domain errors wrapping the cause; a fetch that matches
//! nothing is an empty result.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use data_types::{join_list, ChannelDataChunk, Direction, CHUNK_COLLECTION};
use doc_store::{DbAction, DocumentStore, Filter, SortKey, Transaction};
use observability_deps::tracing::debug;
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use uuid::Uuid;

/// Errors of the chunk store.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("error reading chunks: {source}"))]
    Read { source: doc_store::Error },

    #[snafu(display("error decoding chunk document: {source}"))]
    Decode { source: serde_json::Error },

    #[snafu(display("error writing chunks: {source}"))]
    Write { source: doc_store::Error },

    #[snafu(display("error encoding chunk document: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("error deleting chunks: {source}"))]
    Delete { source: doc_store::Error },
}

/// Chunk-store result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Chunk persistence over a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct ChunkStore {
    store: Arc<dyn DocumentStore>,
}

impl ChunkStore {
    /// Create a chunk store over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch the chunks of `uri` whose covered span overlaps the requested
    /// bounds, ordered by `indices.0.start` in log direction.
    ///
    /// The mnemonic and bound clauses are only added when a bound is
    /// present, so an unbounded fetch returns the whole log. An unknown URI
    /// yields an empty vector.
    pub async fn fetch(
        &self,
        uri: &str,
        primary_mnemonic: &str,
        start: Option<f64>,
        end: Option<f64>,
        direction: Direction,
    ) -> Result<Vec<ChannelDataChunk>> {
        let mut clauses = vec![Filter::eq_ci("uri", uri)];
        if start.is_some() || end.is_some() {
            clauses.push(Filter::eq("indices.0.mnemonic", primary_mnemonic));
        }
        // A chunk overlaps [start, end] when it ends at or past the start
        // and begins at or before the end; mirrored for decreasing logs.
        match direction {
            Direction::Increasing => {
                if let Some(start) = start {
                    clauses.push(Filter::gte("indices.0.end", start));
                }
                if let Some(end) = end {
                    clauses.push(Filter::lte("indices.0.start", end));
                }
            }
            Direction::Decreasing => {
                if let Some(start) = start {
                    clauses.push(Filter::lte("indices.0.end", start));
                }
                if let Some(end) = end {
                    clauses.push(Filter::gte("indices.0.start", end));
                }
            }
        }

        let sort = if direction.is_increasing() {
            SortKey::asc("indices.0.start")
        } else {
            SortKey::desc("indices.0.start")
        };

        let documents = self
            .store
            .query(CHUNK_COLLECTION, &Filter::and(clauses), Some(&sort))
            .await
            .context(ReadSnafu)?;

        debug!(uri, chunks = documents.len(), "fetched chunk documents");
        documents
            .into_iter()
            .map(|doc| serde_json::from_value(doc).context(DecodeSnafu))
            .collect()
    }

    /// Write one batch of chunks for `uri`.
    ///
    /// A chunk without a uid is inserted under a fresh one; a chunk with a
    /// uid replaces the stored document addressed by `(uri, uid)`. The
    /// shared per-write attributes (URI and the three comma-joined lists)
    /// are applied here so the chunker stays ignorant of them. Every
    /// mutation is attached to `transaction` before it is applied, and the
    /// transaction is saved once the batch is done.
    pub async fn bulk_write(
        &self,
        uri: &str,
        chunks: Vec<ChannelDataChunk>,
        mnemonics: &[String],
        units: &[String],
        null_values: &[String],
        transaction: Option<&Transaction>,
    ) -> Result<usize> {
        let mnemonic_list = join_list(mnemonics);
        let unit_list = join_list(units);
        let null_value_list = join_list(null_values);

        let written = chunks.len();
        for mut chunk in chunks {
            chunk.uri = uri.to_string();
            chunk.mnemonic_list = mnemonic_list.clone();
            chunk.unit_list = unit_list.clone();
            chunk.null_value_list = null_value_list.clone();

            match chunk.uid.clone() {
                None => {
                    let uid = Uuid::new_v4().to_string();
                    chunk.uid = Some(uid.clone());
                    if let Some(tx) = transaction {
                        tx.attach(DbAction::Add, CHUNK_COLLECTION, uri, Some(uid));
                    }
                    let doc = serde_json::to_value(&chunk).context(EncodeSnafu)?;
                    self.store
                        .insert(CHUNK_COLLECTION, doc)
                        .await
                        .context(WriteSnafu)?;
                }
                Some(uid) => {
                    if let Some(tx) = transaction {
                        tx.attach(DbAction::Update, CHUNK_COLLECTION, uri, Some(uid.clone()));
                    }
                    let filter = Filter::and(vec![
                        Filter::eq_ci("uri", uri),
                        Filter::eq("uid", uid.as_str()),
                    ]);
                    let doc = serde_json::to_value(&chunk).context(EncodeSnafu)?;
                    self.store
                        .update(CHUNK_COLLECTION, &filter, doc)
                        .await
                        .context(WriteSnafu)?;
                }
            }
        }

        if let Some(tx) = transaction {
            tx.save().await.context(WriteSnafu)?;
        }
        debug!(uri, written, "bulk-wrote chunks");
        Ok(written)
    }

    /// Cascade-delete every chunk of `uri`.
    pub async fn delete_by_uri(
        &self,
        uri: &str,
        transaction: Option<&Transaction>,
    ) -> Result<u64> {
        if let Some(tx) = transaction {
            tx.attach(DbAction::Delete, CHUNK_COLLECTION, uri, None);
            tx.save().await.context(DeleteSnafu)?;
        }

        let deleted = self
            .store
            .delete(CHUNK_COLLECTION, &Filter::eq_ci("uri", uri))
            .await
            .context(DeleteSnafu)?;
        debug!(uri, deleted, "deleted chunks");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_types::{ChannelIndex, IndexRange};
    use doc_store::MemStore;

    const URI: &str = "eml://witsml14/well(w1)/wellbore(b1)/log(l1)";

    fn store() -> ChunkStore {
        test_helpers::maybe_start_logging();
        ChunkStore::new(Arc::new(MemStore::new()))
    }

    fn chunk(range: IndexRange, direction: Direction) -> ChannelDataChunk {
        ChannelDataChunk {
            uid: None,
            uri: String::new(),
            indices: vec![ChannelIndex::new("DEPTH", "m", direction, false).with_range(range)],
            mnemonic_list: String::new(),
            unit_list: String::new(),
            null_value_list: String::new(),
            data: "[[0,0]]".to_string(),
            record_count: 1,
        }
    }

    fn lists() -> (Vec<String>, Vec<String>, Vec<String>) {
        (
            vec!["DEPTH".into(), "GR".into()],
            vec!["m".into(), "gAPI".into()],
            vec!["".into(), "-999.25".into()],
        )
    }

    #[tokio::test]
    async fn bulk_write_assigns_uids_and_shared_attributes() {
        let chunks = store();
        let (mnemonics, units, nulls) = lists();

        let written = chunks
            .bulk_write(
                URI,
                vec![
                    chunk(IndexRange::new(100.0, 300.0), Direction::Increasing),
                    chunk(IndexRange::new(1500.0, 1500.0), Direction::Increasing),
                ],
                &mnemonics,
                &units,
                &nulls,
                None,
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let fetched = chunks
            .fetch(URI, "DEPTH", None, None, Direction::Increasing)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|c| c.uid.is_some()));
        assert!(fetched.iter().all(|c| c.uri == URI));
        assert!(fetched.iter().all(|c| c.mnemonic_list == "DEPTH,GR"));
        assert_eq!(fetched[0].indices[0].start, 100.0);
    }

    #[tokio::test]
    async fn bulk_write_updates_in_place_by_uid() {
        let chunks = store();
        let (mnemonics, units, nulls) = lists();

        chunks
            .bulk_write(
                URI,
                vec![chunk(IndexRange::new(100.0, 300.0), Direction::Increasing)],
                &mnemonics,
                &units,
                &nulls,
                None,
            )
            .await
            .unwrap();

        let mut stored = chunks
            .fetch(URI, "DEPTH", None, None, Direction::Increasing)
            .await
            .unwrap()
            .remove(0);
        let uid = stored.uid.clone();

        stored.data = "[[100,1],[200,2]]".to_string();
        stored.record_count = 2;
        stored.indices[0].end = 200.0;
        chunks
            .bulk_write(URI, vec![stored], &mnemonics, &units, &nulls, None)
            .await
            .unwrap();

        let fetched = chunks
            .fetch(URI, "DEPTH", None, None, Direction::Increasing)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].uid, uid);
        assert_eq!(fetched[0].record_count, 2);
    }

    #[tokio::test]
    async fn fetch_filters_by_overlap_and_sorts_by_direction() {
        let chunks = store();
        let (mnemonics, units, nulls) = lists();

        chunks
            .bulk_write(
                URI,
                vec![
                    chunk(IndexRange::new(2500.0, 2500.0), Direction::Increasing),
                    chunk(IndexRange::new(100.0, 300.0), Direction::Increasing),
                    chunk(IndexRange::new(1500.0, 1500.0), Direction::Increasing),
                ],
                &mnemonics,
                &units,
                &nulls,
                None,
            )
            .await
            .unwrap();

        let overlapping = chunks
            .fetch(URI, "DEPTH", Some(200.0), Some(1600.0), Direction::Increasing)
            .await
            .unwrap();
        assert_eq!(
            overlapping
                .iter()
                .map(|c| c.indices[0].start)
                .collect::<Vec<_>>(),
            vec![100.0, 1500.0],
        );

        // One-sided bound.
        let tail = chunks
            .fetch(URI, "DEPTH", Some(1000.0), None, Direction::Increasing)
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);

        // URIs match case-insensitively.
        let upper = chunks
            .fetch(&URI.to_uppercase(), "DEPTH", None, None, Direction::Increasing)
            .await
            .unwrap();
        assert_eq!(upper.len(), 3);

        // Unknown URI is an empty result, not an error.
        let none = chunks
            .fetch("eml://other", "DEPTH", None, None, Direction::Increasing)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn decreasing_fetch_mirrors_bounds() {
        let chunks = store();
        let (mnemonics, units, nulls) = lists();

        chunks
            .bulk_write(
                URI,
                vec![
                    chunk(IndexRange::new(300.0, 100.0), Direction::Decreasing),
                    chunk(IndexRange::new(2500.0, 2000.0), Direction::Decreasing),
                ],
                &mnemonics,
                &units,
                &nulls,
                None,
            )
            .await
            .unwrap();

        let fetched = chunks
            .fetch(URI, "DEPTH", Some(2600.0), Some(2100.0), Direction::Decreasing)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].indices[0].start, 2500.0);

        let all = chunks
            .fetch(URI, "DEPTH", None, None, Direction::Decreasing)
            .await
            .unwrap();
        assert_eq!(all[0].indices[0].start, 2500.0);
        assert_eq!(all[1].indices[0].start, 300.0);
    }

    #[tokio::test]
    async fn delete_by_uri_cascades() {
        let chunks = store();
        let (mnemonics, units, nulls) = lists();

        chunks
            .bulk_write(
                URI,
                vec![
                    chunk(IndexRange::new(100.0, 300.0), Direction::Increasing),
                    chunk(IndexRange::new(1500.0, 1500.0), Direction::Increasing),
                ],
                &mnemonics,
                &units,
                &nulls,
                None,
            )
            .await
            .unwrap();

        let deleted = chunks.delete_by_uri(URI, None).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(chunks
            .fetch(URI, "DEPTH", None, None, Direction::Increasing)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn mutations_are_attached_to_the_transaction() {
        let mem: Arc<dyn DocumentStore> = Arc::new(MemStore::new());
        let chunks = ChunkStore::new(Arc::clone(&mem));
        let (mnemonics, units, nulls) = lists();

        let tx = Transaction::new(Arc::clone(&mem));
        chunks
            .bulk_write(
                URI,
                vec![chunk(IndexRange::new(100.0, 300.0), Direction::Increasing)],
                &mnemonics,
                &units,
                &nulls,
                Some(&tx),
            )
            .await
            .unwrap();

        let records = mem
            .query(
                doc_store::TRANSACTION_COLLECTION,
                &Filter::eq("transactionId", tx.id()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["action"], "add");

        tx.commit().await.unwrap();
    }
}
