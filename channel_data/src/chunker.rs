//! Splitting a record stream into extent-aligned chunks.

use crate::{
    ChannelDataRecord, DuplicateIndexSnafu, IndexOutOfOrderSnafu, InvalidRangeSnafu, Result,
};
use data_types::{aligned_extent, ChannelDataChunk, ChannelIndex, Direction, IndexRange};
use observability_deps::tracing::debug;
use serde_json::Value;
use snafu::ensure;
use std::sync::Arc;

/// Iterator adaptor that turns an ordered record stream into chunks aligned
/// to `range_size`.
///
/// Containment against the planned extent is open-ended: a record whose
/// index equals the extent boundary starts the next chunk. Each emitted
/// chunk carries its data, per-chunk index bounds, the record count, and the
/// chunk id of its first record (the store's insert-vs-update signal);
/// shared per-write attributes are applied by the store at bulk-write time.
///
/// Index validation happens on every input row before anything is emitted,
/// so a duplicate or out-of-order index aborts the stream with nothing
/// persisted.
#[derive(Debug)]
pub struct RecordChunker<I> {
    records: I,
    indices: Vec<ChannelIndex>,
    range_size: f64,
    direction: Direction,

    planned_extent: Option<IndexRange>,
    rows: Vec<Vec<Value>>,
    start: f64,
    end: f64,
    uid: Option<String>,
    previous: Option<f64>,
    done: bool,
}

impl<I> RecordChunker<I>
where
    I: Iterator<Item = ChannelDataRecord>,
{
    /// Create a chunker over `records` using the stream's index descriptors.
    pub fn new(records: I, indices: Vec<ChannelIndex>, range_size: f64) -> Result<Self> {
        ensure!(
            range_size.is_finite() && range_size > 0.0,
            InvalidRangeSnafu {
                reason: format!("chunk range size must be positive, got {range_size}"),
            }
        );
        ensure!(
            !indices.is_empty(),
            InvalidRangeSnafu {
                reason: "cannot chunk a stream without an index descriptor".to_string(),
            }
        );
        let direction = indices[0].direction;

        Ok(Self {
            records,
            indices,
            range_size,
            direction,
            planned_extent: None,
            rows: vec![],
            start: 0.0,
            end: 0.0,
            uid: None,
            previous: None,
            done: false,
        })
    }

    fn seed(&mut self, record: ChannelDataRecord) {
        let index = record.index();
        self.planned_extent = Some(aligned_extent(index, self.range_size, self.direction));
        self.start = index;
        self.end = index;
        self.uid = record.chunk_id().map(str::to_string);
        self.rows = vec![self.serialize_row(record)];
    }

    fn push(&mut self, record: ChannelDataRecord) {
        self.end = record.index();
        let row = self.serialize_row(record);
        self.rows.push(row);
    }

    /// Replace nulls with the channel's sentinel so stored rows keep full
    /// column arity.
    fn serialize_row(&self, record: ChannelDataRecord) -> Vec<Value> {
        let columns = Arc::clone(record.columns());
        let (values, _) = record.into_parts();
        values
            .into_iter()
            .enumerate()
            .map(|(col, value)| {
                if col > 0 && columns.is_null(col, &value) {
                    columns.null_sentinel(col)
                } else {
                    value
                }
            })
            .collect()
    }

    fn build_chunk(&mut self) -> ChannelDataChunk {
        let rows = std::mem::take(&mut self.rows);
        let mut indices = self.indices.clone();
        indices[0].start = self.start;
        indices[0].end = self.end;

        let chunk = ChannelDataChunk {
            uid: self.uid.take(),
            uri: String::new(),
            indices,
            mnemonic_list: String::new(),
            unit_list: String::new(),
            null_value_list: String::new(),
            record_count: rows.len(),
            data: serde_json::to_string(&rows).expect("rows are plain JSON values"),
        };
        debug!(
            start = chunk.indices[0].start,
            end = chunk.indices[0].end,
            records = chunk.record_count,
            "emitting chunk",
        );
        self.planned_extent = None;
        chunk
    }
}

impl<I> Iterator for RecordChunker<I>
where
    I: Iterator<Item = ChannelDataRecord>,
{
    type Item = Result<ChannelDataChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.records.next() {
                Some(record) => record,
                None => {
                    // Trailing partial chunk.
                    self.done = true;
                    return (!self.rows.is_empty()).then(|| Ok(self.build_chunk()));
                }
            };

            let index = record.index();
            if let Some(previous) = self.previous {
                if previous == index {
                    self.done = true;
                    return Some(DuplicateIndexSnafu { value: index }.fail());
                }
                if !self.direction.comes_before(previous, index) {
                    self.done = true;
                    return Some(
                        IndexOutOfOrderSnafu {
                            previous,
                            current: index,
                        }
                        .fail(),
                    );
                }
            }
            self.previous = Some(index);

            match self.planned_extent {
                None => self.seed(record),
                Some(extent) if extent.contains(index, self.direction, false) => self.push(record),
                Some(_) => {
                    let chunk = self.build_chunk();
                    self.seed(record);
                    return Some(Ok(chunk));
                }
            }
        }
    }
}

/// Run the chunker to completion, failing fast on the first invalid row.
///
/// Used by write paths so that nothing is persisted when validation fails
/// mid-stream.
pub fn chunk_records<I>(
    records: I,
    indices: Vec<ChannelIndex>,
    range_size: f64,
) -> Result<Vec<ChannelDataChunk>>
where
    I: Iterator<Item = ChannelDataRecord>,
{
    RecordChunker::new(records, indices, range_size)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelDataReader, Error};
    use assert_matches::assert_matches;

    const RANGE_SIZE: f64 = 1000.0;

    fn reader(data: &str, direction: Direction) -> ChannelDataReader {
        test_helpers::maybe_start_logging();
        ChannelDataReader::new(
            "eml://log(l1)",
            vec!["DEPTH".into(), "GR".into(), "ROP".into()],
            vec!["m".into(), "gAPI".into(), "m/h".into()],
            vec!["".into(), "-999.25".into(), "-999.25".into()],
            vec![ChannelIndex::new("DEPTH", "m", direction, false)],
            data,
        )
        .unwrap()
    }

    fn chunk(data: &str) -> Result<Vec<ChannelDataChunk>> {
        let reader = reader(data, Direction::Increasing);
        let indices = reader.indices().to_vec();
        chunk_records(reader.into_records(), indices, RANGE_SIZE)
    }

    #[test]
    fn single_extent_write_yields_one_chunk() {
        let chunks = chunk("[[100,10,20],[200,10,20],[300,10,20]]").unwrap();
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.indices[0].start, 100.0);
        assert_eq!(chunk.indices[0].end, 300.0);
        assert_eq!(chunk.record_count, 3);
        assert_eq!(chunk.uid, None);
    }

    #[test]
    fn records_split_at_extent_boundaries() {
        let chunks = chunk("[[100,10,20],[1500,10,20],[2500,10,20]]").unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks
                .iter()
                .map(|c| (c.indices[0].start, c.indices[0].end))
                .collect::<Vec<_>>(),
            vec![(100.0, 100.0), (1500.0, 1500.0), (2500.0, 2500.0)],
        );
    }

    #[test]
    fn boundary_index_starts_the_next_chunk() {
        let chunks = chunk("[[999,10,20],[1000,10,20]]").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].indices[0].end, 999.0);
        assert_eq!(chunks[1].indices[0].start, 1000.0);
    }

    #[test]
    fn single_record_chunk_has_equal_bounds() {
        let chunks = chunk("[[100,10,20]]").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].indices[0].start, chunks[0].indices[0].end);
        assert_eq!(chunks[0].record_count, 1);
    }

    #[test]
    fn empty_stream_emits_nothing() {
        assert!(chunk("[]").unwrap().is_empty());
    }

    #[test]
    fn duplicate_index_aborts() {
        assert_matches!(
            chunk("[[100,10,20],[100,11,21]]"),
            Err(Error::DuplicateIndex { value }) if value == 100.0
        );
    }

    #[test]
    fn out_of_order_index_aborts() {
        assert_matches!(
            chunk("[[300,10,20],[200,11,21]]"),
            Err(Error::IndexOutOfOrder { previous, current }) if previous == 300.0 && current == 200.0
        );
    }

    #[test]
    fn decreasing_stream_chunks_mirror() {
        let reader = reader("[[2500,10,20],[1500,10,20],[100,10,20]]", Direction::Decreasing);
        let indices = reader.indices().to_vec();
        let chunks = chunk_records(reader.into_records(), indices, RANGE_SIZE).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].indices[0].start, 2500.0);
        assert_eq!(chunks[2].indices[0].end, 100.0);
    }

    #[test]
    fn uid_of_first_record_is_carried() {
        let stored = ChannelDataChunk {
            uid: Some("c-1".to_string()),
            uri: "eml://log(l1)".to_string(),
            indices: vec![
                ChannelIndex::new("DEPTH", "m", Direction::Increasing, false)
                    .with_range(IndexRange::new(100.0, 200.0)),
            ],
            mnemonic_list: "DEPTH,GR".to_string(),
            unit_list: "m,gAPI".to_string(),
            null_value_list: ",-999.25".to_string(),
            data: "[[100,10],[200,11]]".to_string(),
            record_count: 2,
        };
        let reader = ChannelDataReader::from_chunks(&[stored]).unwrap();
        let indices = reader.indices().to_vec();
        let chunks = chunk_records(reader.into_records(), indices, RANGE_SIZE).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].uid.as_deref(), Some("c-1"));
    }

    #[test]
    fn nulls_are_stored_as_sentinels() {
        let chunks = chunk("[[100,null,20]]").unwrap();
        assert_eq!(chunks[0].data, "[[100,-999.25,20]]");
    }
}
