//! Channel index descriptors and the chunk document.

use crate::{Direction, IndexRange};
use serde::{Deserialize, Serialize};

/// Name of the document-store collection holding chunk documents.
pub const CHUNK_COLLECTION: &str = "channelDataChunk";

/// One index axis of a log.
///
/// Inside a chunk document, `start` and `end` bracket exactly the records
/// stored in that chunk (inclusive on both sides, in log order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelIndex {
    /// Short identifier of the index curve, unique per log.
    pub mnemonic: String,

    /// Unit of measure of the index values.
    pub unit: String,

    /// Direction of the index axis.
    pub direction: Direction,

    /// Time index, encoded as microseconds since the Unix epoch.
    pub is_time_index: bool,

    /// UTC offset of the first observed reader, for echoing date-time
    /// indices back with their original offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_seconds: Option<i32>,

    /// First record's index value, in log order.
    pub start: f64,

    /// Last record's index value, in log order.
    pub end: f64,
}

impl ChannelIndex {
    /// A descriptor with empty bounds.
    pub fn new(
        mnemonic: impl Into<String>,
        unit: impl Into<String>,
        direction: Direction,
        is_time_index: bool,
    ) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            unit: unit.into(),
            direction,
            is_time_index,
            utc_offset_seconds: None,
            start: 0.0,
            end: 0.0,
        }
    }

    /// The span covered by this index, in log order.
    pub fn range(&self) -> IndexRange {
        IndexRange::new(self.start, self.end)
    }

    /// Replace the covered span.
    pub fn with_range(mut self, range: IndexRange) -> Self {
        self.start = range.start;
        self.end = range.end;
        self
    }
}

/// The storage atom: a fixed-extent window of records for one log.
///
/// `data` is an opaque serialization unit, a JSON array of rows whose first
/// element is the primary index value; only the record reader parses it.
/// The three comma-joined lists are parallel to the record columns, with the
/// primary index mnemonic at position zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDataChunk {
    /// Opaque id, assigned once at first insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Parent log URI, immutable for the life of the chunk.
    #[serde(default)]
    pub uri: String,

    /// Index descriptors; the first entry is the primary index.
    pub indices: Vec<ChannelIndex>,

    /// Comma-joined channel mnemonics.
    #[serde(default)]
    pub mnemonic_list: String,

    /// Comma-joined units of measure.
    #[serde(default)]
    pub unit_list: String,

    /// Comma-joined null sentinels.
    #[serde(default)]
    pub null_value_list: String,

    /// Serialized record array.
    pub data: String,

    /// Number of records in `data`.
    pub record_count: usize,
}

impl ChannelDataChunk {
    /// The primary index descriptor, if any.
    pub fn primary_index(&self) -> Option<&ChannelIndex> {
        self.indices.first()
    }

    /// The primary-index span covered by this chunk, in log order.
    pub fn index_range(&self) -> Option<IndexRange> {
        self.primary_index().map(ChannelIndex::range)
    }

    /// Direction of the primary index.
    pub fn direction(&self) -> Option<Direction> {
        self.primary_index().map(|i| i.direction)
    }

    /// The channel mnemonics, split out of the comma-joined list.
    pub fn mnemonics(&self) -> Vec<String> {
        split_list(&self.mnemonic_list)
    }
}

/// Split a comma-joined list into its elements.
///
/// An empty string yields no elements, preserving arity invariants for
/// chunks written before any channels existed.
pub fn split_list(list: &str) -> Vec<String> {
    if list.is_empty() {
        return vec![];
    }
    list.split(',').map(str::to_string).collect()
}

/// Join list elements with commas.
pub fn join_list<S: AsRef<str>>(elements: &[S]) -> String {
    elements
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_index() -> ChannelIndex {
        ChannelIndex::new("DEPTH", "m", Direction::Increasing, false)
            .with_range(IndexRange::new(100.0, 300.0))
    }

    #[test]
    fn chunk_document_round_trips_camel_case() {
        let chunk = ChannelDataChunk {
            uid: Some("c-1".to_string()),
            uri: "eml://witsml14/well(w1)/wellbore(b1)/log(l1)".to_string(),
            indices: vec![depth_index()],
            mnemonic_list: "DEPTH,GR,ROP".to_string(),
            unit_list: "m,gAPI,m/h".to_string(),
            null_value_list: ",-999.25,-999.25".to_string(),
            data: "[[100,10,20]]".to_string(),
            record_count: 1,
        };

        let doc = serde_json::to_value(&chunk).unwrap();
        assert_eq!(doc["mnemonicList"], "DEPTH,GR,ROP");
        assert_eq!(doc["indices"][0]["isTimeIndex"], false);
        assert_eq!(doc["indices"][0]["start"], 100.0);

        let back: ChannelDataChunk = serde_json::from_value(doc).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn list_helpers_preserve_arity() {
        assert_eq!(split_list(""), Vec::<String>::new());
        assert_eq!(split_list("DEPTH,GR"), vec!["DEPTH", "GR"]);
        // Empty elements survive, one per column.
        assert_eq!(split_list(",-999.25"), vec!["", "-999.25"]);
        assert_eq!(join_list(&["DEPTH", "GR"]), "DEPTH,GR");
    }

    #[test]
    fn chunk_accessors() {
        let chunk = ChannelDataChunk {
            uid: None,
            uri: String::new(),
            indices: vec![depth_index()],
            mnemonic_list: "DEPTH,GR".to_string(),
            unit_list: "m,gAPI".to_string(),
            null_value_list: ",-999.25".to_string(),
            data: "[]".to_string(),
            record_count: 0,
        };

        assert_eq!(chunk.index_range(), Some(IndexRange::new(100.0, 300.0)));
        assert_eq!(chunk.direction(), Some(Direction::Increasing));
        assert_eq!(chunk.mnemonics(), vec!["DEPTH", "GR"]);
    }
}
