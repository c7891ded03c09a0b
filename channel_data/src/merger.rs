//! Three-way merge of stored records, incoming records and an update range.

use crate::{
    ChannelDataReader, ChannelDataRecord, ColumnSet, IntoRecords, InvalidRangeSnafu, Result,
    UnitMismatchSnafu,
};
use data_types::{ChannelIndex, Direction, IndexRange};
use observability_deps::tracing::debug;
use serde_json::Value;
use snafu::ensure;
use std::{iter::Peekable, sync::Arc};

/// Merges an `existing` record stream (from overlapping stored chunks) with
/// an `incoming` stream under an `update_range`, yielding the stream to be
/// re-chunked.
///
/// The output column layout is the union of both streams' channels, existing
/// order first. Per-channel overwrite and clearing decisions are driven by
/// the incoming stream's channel sub-ranges:
///
/// * rows at equal indices merge column-wise, incoming winning wherever its
///   channel sub-range contains the index;
/// * incoming-only rows are emitted with the chunk id carried from the
///   preceding existing row, so new rows inherit placement;
/// * existing-only rows outside the update range pass through unchanged;
/// * existing-only rows inside the update range have every incoming-covered
///   channel cleared, and are dropped entirely when no value remains.
///
/// Both inputs must be strictly monotonic in the shared direction; the
/// chunker downstream enforces that for the merged output.
#[derive(Debug)]
pub struct RecordMerger {
    existing: Peekable<IntoRecords>,
    incoming: Peekable<IntoRecords>,
    update_range: IndexRange,
    direction: Direction,
    columns: Arc<ColumnSet>,
    indices: Vec<ChannelIndex>,
    existing_positions: Vec<usize>,
    incoming_positions: Vec<usize>,
    incoming_ranges: Vec<Option<IndexRange>>,
    carried_id: Option<String>,
}

enum Side {
    Both,
    Existing,
    Incoming,
}

impl RecordMerger {
    /// Build a merger; `existing` is `None` when no stored chunks overlap
    /// the update range.
    pub fn new(
        existing: Option<ChannelDataReader>,
        incoming: ChannelDataReader,
        update_range: IndexRange,
    ) -> Result<Self> {
        if let Some(existing) = &existing {
            ensure!(
                existing.direction() == incoming.direction(),
                InvalidRangeSnafu {
                    reason: format!(
                        "incoming direction {:?} disagrees with stored direction {:?}",
                        incoming.direction(),
                        existing.direction()
                    ),
                }
            );

            for (col, mnemonic) in existing.columns().mnemonics().iter().enumerate() {
                if let Some(incoming_col) = incoming.columns().position(mnemonic) {
                    let stored_unit = &existing.columns().units()[col];
                    let incoming_unit = &incoming.columns().units()[incoming_col];
                    ensure!(
                        stored_unit == incoming_unit,
                        UnitMismatchSnafu {
                            mnemonic: mnemonic.clone(),
                            existing: stored_unit.clone(),
                            incoming: incoming_unit.clone(),
                        }
                    );
                }
            }
        }

        let direction = match &existing {
            Some(e) if !e.is_empty() => e.direction(),
            _ => incoming.direction(),
        };

        // Union column layout, existing order first.
        let mut mnemonics: Vec<String> = vec![];
        let mut units: Vec<String> = vec![];
        let mut null_values: Vec<String> = vec![];
        let mut merged_ranges: Vec<Option<IndexRange>> = vec![];
        let mut add_columns = |columns: &ColumnSet| {
            for (col, mnemonic) in columns.mnemonics().iter().enumerate() {
                if !mnemonics.contains(mnemonic) {
                    mnemonics.push(mnemonic.clone());
                    units.push(columns.units()[col].clone());
                    null_values.push(columns.null_values()[col].clone());
                    // Accumulate in min/max form; log order is restored below.
                    merged_ranges.push(columns.channel_range(col).map(|r| r.min_max()));
                } else if let Some(target) = mnemonics.iter().position(|m| m == mnemonic) {
                    if let Some(range) = columns.channel_range(col) {
                        let sorted = range.min_max();
                        match &mut merged_ranges[target] {
                            Some(merged) => {
                                merged.widen(sorted.start);
                                merged.widen(sorted.end);
                            }
                            None => merged_ranges[target] = Some(sorted),
                        }
                    }
                }
            }
        };
        if let Some(existing) = &existing {
            add_columns(existing.columns());
        }
        add_columns(incoming.columns());

        // Min/max accumulation above loses log order; restore it.
        let merged_ranges = merged_ranges
            .into_iter()
            .map(|range| {
                range.map(|r| {
                    let sorted = r.min_max();
                    if direction.is_increasing() {
                        sorted
                    } else {
                        IndexRange::new(sorted.end, sorted.start)
                    }
                })
            })
            .collect::<Vec<_>>();

        let columns = ColumnSet::new(mnemonics.clone(), units, null_values)?
            .with_channel_ranges(merged_ranges);

        let position_of = |m: &str| {
            mnemonics
                .iter()
                .position(|candidate| candidate == m)
                .expect("merged layout is a union")
        };
        let existing_positions: Vec<usize> = existing
            .as_ref()
            .map(|e| e.columns().mnemonics().iter().map(|m| position_of(m)).collect())
            .unwrap_or_default();
        let incoming_positions: Vec<usize> = incoming
            .columns()
            .mnemonics()
            .iter()
            .map(|m| position_of(m))
            .collect();

        let mut incoming_ranges: Vec<Option<IndexRange>> = vec![None; mnemonics.len()];
        for (col, &target) in incoming_positions.iter().enumerate() {
            incoming_ranges[target] = incoming.columns().channel_range(col);
        }

        let indices = match &existing {
            Some(e) => e.indices().to_vec(),
            None => incoming.indices().to_vec(),
        };

        debug!(
            existing_rows = existing.as_ref().map(ChannelDataReader::len).unwrap_or(0),
            incoming_rows = incoming.len(),
            update_start = update_range.start,
            update_end = update_range.end,
            "merging record streams",
        );

        let columns = Arc::new(columns);
        let existing_records = match existing {
            Some(e) => e.into_records(),
            None => IntoRecords::empty(Arc::clone(&columns)),
        };

        Ok(Self {
            existing: existing_records.peekable(),
            incoming: incoming.into_records().peekable(),
            update_range,
            direction,
            columns,
            indices,
            existing_positions,
            incoming_positions,
            incoming_ranges,
            carried_id: None,
        })
    }

    /// Column metadata of the merged stream.
    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    /// Index descriptors for the merged stream, primary first.
    pub fn indices(&self) -> &[ChannelIndex] {
        &self.indices
    }

    fn map_row(&self, record: &ChannelDataRecord, positions: &[usize]) -> Vec<Value> {
        let mut row = vec![Value::Null; self.columns.len()];
        for (col, &target) in positions.iter().enumerate() {
            row[target] = record.value(col).clone();
        }
        row
    }

    fn incoming_covers(&self, target: usize, index: f64) -> bool {
        self.incoming_ranges[target]
            .map(|range| range.contains(index, self.direction, true))
            .unwrap_or(false)
    }
}

impl Iterator for RecordMerger {
    type Item = ChannelDataRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let side = match (self.existing.peek(), self.incoming.peek()) {
                (None, None) => return None,
                (Some(_), None) => Side::Existing,
                (None, Some(_)) => Side::Incoming,
                (Some(e), Some(u)) => {
                    if e.index() == u.index() {
                        Side::Both
                    } else if self.direction.comes_before(u.index(), e.index()) {
                        Side::Incoming
                    } else {
                        Side::Existing
                    }
                }
            };

            match side {
                Side::Both => {
                    let e = self.existing.next().expect("peeked");
                    let u = self.incoming.next().expect("peeked");
                    let index = e.index();
                    self.carried_id = e.chunk_id().map(str::to_string);

                    let mut row = self.map_row(&e, &self.existing_positions);
                    for (col, &target) in self.incoming_positions.iter().enumerate() {
                        if col > 0 && self.incoming_covers(target, index) {
                            row[target] = u.value(col).clone();
                        }
                    }
                    return Some(ChannelDataRecord::new(
                        row,
                        self.carried_id.clone(),
                        Arc::clone(&self.columns),
                    ));
                }
                Side::Incoming => {
                    let u = self.incoming.next().expect("peeked");
                    let row = self.map_row(&u, &self.incoming_positions);
                    return Some(ChannelDataRecord::new(
                        row,
                        self.carried_id.clone(),
                        Arc::clone(&self.columns),
                    ));
                }
                Side::Existing => {
                    let e = self.existing.next().expect("peeked");
                    let index = e.index();
                    self.carried_id = e.chunk_id().map(str::to_string);
                    let mut row = self.map_row(&e, &self.existing_positions);

                    if self.update_range.contains(index, self.direction, true) {
                        // Clearing merge: the caller asked for this span to be
                        // replaced, so incoming-covered channels lose their
                        // stored values.
                        let mut cleared = false;
                        for (col, &target) in self.incoming_positions.iter().enumerate() {
                            if col > 0 && self.incoming_covers(target, index) {
                                row[target] = Value::Null;
                                cleared = true;
                            }
                        }
                        let record = ChannelDataRecord::new(
                            row,
                            self.carried_id.clone(),
                            Arc::clone(&self.columns),
                        );
                        // Untouched rows always survive; a cleared row only
                        // if some value remains.
                        if cleared && !record.has_values() {
                            continue;
                        }
                        return Some(record);
                    }

                    return Some(ChannelDataRecord::new(
                        row,
                        self.carried_id.clone(),
                        Arc::clone(&self.columns),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use assert_matches::assert_matches;
    use data_types::ChannelDataChunk;
    use serde_json::json;

    fn depth_index(direction: Direction) -> ChannelIndex {
        ChannelIndex::new("DEPTH", "m", direction, false)
    }

    fn incoming(
        mnemonics: &[&str],
        units: &[&str],
        data: &str,
        direction: Direction,
    ) -> ChannelDataReader {
        ChannelDataReader::new(
            "eml://log(l1)",
            mnemonics.iter().map(|s| s.to_string()).collect(),
            units.iter().map(|s| s.to_string()).collect(),
            std::iter::once("".to_string())
                .chain(std::iter::repeat("-999.25".to_string()))
                .take(mnemonics.len())
                .collect(),
            vec![depth_index(direction)],
            data,
        )
        .unwrap()
    }

    fn stored(data: &str, count: usize) -> ChannelDataReader {
        test_helpers::maybe_start_logging();
        let chunk = ChannelDataChunk {
            uid: Some("c-1".to_string()),
            uri: "eml://log(l1)".to_string(),
            indices: vec![depth_index(Direction::Increasing)],
            mnemonic_list: "DEPTH,GR,ROP".to_string(),
            unit_list: "m,gAPI,m/h".to_string(),
            null_value_list: ",-999.25,-999.25".to_string(),
            data: data.to_string(),
            record_count: count,
        };
        ChannelDataReader::from_chunks(&[chunk]).unwrap()
    }

    #[test]
    fn update_overwrites_covered_channels_only() {
        // Stored rows at 100..300 with GR and ROP; the update carries only
        // ROP over [200, 300].
        let existing = stored("[[100,10,20],[200,10,20],[300,10,20]]", 3);
        let update = incoming(
            &["DEPTH", "ROP"],
            &["m", "m/h"],
            "[[200,99],[250,99],[300,99]]",
            Direction::Increasing,
        );

        let merger = RecordMerger::new(
            Some(existing),
            update,
            IndexRange::new(200.0, 300.0),
        )
        .unwrap();
        assert_eq!(merger.columns().mnemonics(), &["DEPTH", "GR", "ROP"]);

        let rows: Vec<_> = merger.collect();
        let values: Vec<Vec<Value>> = rows.iter().map(|r| r.values().to_vec()).collect();
        assert_eq!(
            values,
            vec![
                vec![json!(100), json!(10), json!(20)],
                vec![json!(200), json!(10), json!(99)],
                vec![json!(250), Value::Null, json!(99)],
                vec![json!(300), json!(10), json!(99)],
            ],
        );

        // The interpolated row inherits the surrounding chunk's id.
        assert_eq!(rows[2].chunk_id(), Some("c-1"));
        assert!(rows[2].is_null(1));
    }

    #[test]
    fn clearing_merge_drops_fully_cleared_rows() {
        let existing = stored("[[100,10,-999.25],[200,11,-999.25],[300,12,-999.25]]", 3);
        // GR covers [100, 300] but has no row at 200, so the stored GR at
        // 200 is cleared; with ROP already null the row disappears.
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "gAPI"],
            "[[100,50],[300,52]]",
            Direction::Increasing,
        );

        let merged: Vec<_> = RecordMerger::new(
            Some(existing),
            update,
            IndexRange::new(100.0, 300.0),
        )
        .unwrap()
        .collect();

        let indexes: Vec<f64> = merged.iter().map(ChannelDataRecord::index).collect();
        assert_eq!(indexes, vec![100.0, 300.0]);
    }

    #[test]
    fn clearing_merge_keeps_rows_with_remaining_values() {
        let existing = stored("[[100,10,20],[200,11,21],[300,12,22]]", 3);
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "gAPI"],
            "[[100,50],[300,52]]",
            Direction::Increasing,
        );

        let merged: Vec<_> = RecordMerger::new(
            Some(existing),
            update,
            IndexRange::new(100.0, 300.0),
        )
        .unwrap()
        .collect();

        assert_eq!(merged.len(), 3);
        // GR cleared at 200, ROP kept.
        assert!(merged[1].is_null(1));
        assert_eq!(merged[1].value(2), &json!(21));
    }

    #[test]
    fn rows_outside_update_range_are_untouched() {
        let existing = stored("[[100,10,20],[200,11,21]]", 2);
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "gAPI"],
            "[[200,50]]",
            Direction::Increasing,
        );

        let merged: Vec<_> = RecordMerger::new(
            Some(existing),
            update,
            IndexRange::new(200.0, 200.0),
        )
        .unwrap()
        .collect();

        assert_eq!(merged[0].value(1), &json!(10));
        assert_eq!(merged[1].value(1), &json!(50));
    }

    #[test]
    fn empty_incoming_returns_stored_stream_unchanged() {
        let existing = stored("[[100,10,20],[200,11,21]]", 2);
        let update = incoming(&["DEPTH", "GR"], &["m", "gAPI"], "[]", Direction::Increasing);

        let merged: Vec<_> = RecordMerger::new(
            Some(existing),
            update,
            IndexRange::new(0.0, 1000.0),
        )
        .unwrap()
        .collect();

        let values: Vec<Vec<Value>> = merged.iter().map(|r| r.values().to_vec()).collect();
        assert_eq!(
            values,
            vec![
                vec![json!(100), json!(10), json!(20)],
                vec![json!(200), json!(11), json!(21)],
            ],
        );
        assert_eq!(merged[0].chunk_id(), Some("c-1"));
    }

    #[test]
    fn no_stored_side_passes_incoming_through() {
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "gAPI"],
            "[[100,50],[200,51]]",
            Direction::Increasing,
        );

        let merged: Vec<_> =
            RecordMerger::new(None, update, IndexRange::new(100.0, 200.0))
                .unwrap()
                .collect();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].chunk_id(), None);
    }

    #[test]
    fn decreasing_streams_merge_in_log_order() {
        let chunk = ChannelDataChunk {
            uid: Some("c-1".to_string()),
            uri: "eml://log(l1)".to_string(),
            indices: vec![depth_index(Direction::Decreasing)],
            mnemonic_list: "DEPTH,GR".to_string(),
            unit_list: "m,gAPI".to_string(),
            null_value_list: ",-999.25".to_string(),
            data: "[[300,12],[200,11],[100,10]]".to_string(),
            record_count: 3,
        };
        let existing = ChannelDataReader::from_chunks(&[chunk]).unwrap();
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "gAPI"],
            "[[250,99]]",
            Direction::Decreasing,
        );

        let merged: Vec<_> = RecordMerger::new(
            Some(existing),
            update,
            IndexRange::new(250.0, 250.0),
        )
        .unwrap()
        .collect();

        let indexes: Vec<f64> = merged.iter().map(ChannelDataRecord::index).collect();
        assert_eq!(indexes, vec![300.0, 250.0, 200.0, 100.0]);
        assert_eq!(merged[1].chunk_id(), Some("c-1"));
    }

    #[test]
    fn direction_disagreement_is_rejected() {
        let existing = stored("[[100,10,20]]", 1);
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "gAPI"],
            "[[100,50]]",
            Direction::Decreasing,
        );

        assert_matches!(
            RecordMerger::new(Some(existing), update, IndexRange::at(100.0)),
            Err(Error::InvalidRange { .. })
        );
    }

    #[test]
    fn heterogeneous_units_are_rejected() {
        let existing = stored("[[100,10,20]]", 1);
        let update = incoming(
            &["DEPTH", "GR"],
            &["m", "api"],
            "[[100,50]]",
            Direction::Increasing,
        );

        assert_matches!(
            RecordMerger::new(Some(existing), update, IndexRange::at(100.0)),
            Err(Error::UnitMismatch { .. })
        );
    }
}
