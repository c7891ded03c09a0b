//! Parsing chunk payloads and incoming data into ordered record streams.

use crate::{ChannelDataRecord, ColumnSet, InvalidRangeSnafu, PayloadSnafu, Result};
use data_types::{split_list, ChannelDataChunk, ChannelIndex, Direction, IndexRange};
use observability_deps::tracing::debug;
use serde_json::Value;
use snafu::{ensure, ResultExt};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Row {
    values: Vec<Value>,
    chunk_id: Option<String>,
}

/// An ordered, forward-only stream of multi-channel rows.
///
/// The reader is the only component that parses serialized chunk `data`;
/// everything else consumes [`ChannelDataRecord`]s. Rows are held in log
/// order; iteration never rewinds (re-fetch to restart).
#[derive(Debug, Clone)]
pub struct ChannelDataReader {
    uri: String,
    indices: Vec<ChannelIndex>,
    columns: Arc<ColumnSet>,
    rows: Vec<Row>,
}

impl ChannelDataReader {
    /// Parse an incoming payload into a reader.
    ///
    /// `data` is a JSON array of rows; each row's first element is the
    /// primary index value and the remaining elements are channel values or
    /// null sentinels. The first mnemonic must name the primary index.
    pub fn new(
        uri: impl Into<String>,
        mnemonics: Vec<String>,
        units: Vec<String>,
        null_values: Vec<String>,
        indices: Vec<ChannelIndex>,
        data: &str,
    ) -> Result<Self> {
        ensure!(
            !indices.is_empty(),
            InvalidRangeSnafu {
                reason: "log has no index descriptor".to_string(),
            }
        );
        let columns = ColumnSet::new(mnemonics, units, null_values)?;
        ensure!(
            columns.mnemonics()[0] == indices[0].mnemonic,
            InvalidRangeSnafu {
                reason: format!(
                    "first column '{}' does not match the primary index '{}'",
                    columns.mnemonics()[0],
                    indices[0].mnemonic
                ),
            }
        );

        let raw: Vec<Vec<Value>> = serde_json::from_str(data).context(PayloadSnafu)?;
        let mut rows = Vec::with_capacity(raw.len());
        for values in raw {
            validate_row(&values, columns.len())?;
            rows.push(Row {
                values,
                chunk_id: None,
            });
        }

        Ok(Self::finish(uri.into(), indices, columns, rows))
    }

    /// Reassemble a reader from a fetched chunk sequence.
    ///
    /// Chunks written at different times may carry different channel sets;
    /// the reader takes the union, filling absent columns with null so every
    /// row has the full arity.
    pub fn from_chunks(chunks: &[ChannelDataChunk]) -> Result<Self> {
        ensure!(
            !chunks.is_empty(),
            InvalidRangeSnafu {
                reason: "cannot build a reader from an empty chunk sequence".to_string(),
            }
        );
        ensure!(
            !chunks[0].indices.is_empty(),
            InvalidRangeSnafu {
                reason: "chunk carries no index descriptor".to_string(),
            }
        );

        // Union of the chunk column sets, first-seen order.
        let mut mnemonics: Vec<String> = vec![];
        let mut units: Vec<String> = vec![];
        let mut null_values: Vec<String> = vec![];
        for chunk in chunks {
            let chunk_mnemonics = split_list(&chunk.mnemonic_list);
            let chunk_units = split_list(&chunk.unit_list);
            let chunk_nulls = split_list(&chunk.null_value_list);
            ensure!(
                chunk_mnemonics.len() == chunk_units.len()
                    && chunk_mnemonics.len() == chunk_nulls.len(),
                InvalidRangeSnafu {
                    reason: format!(
                        "chunk {} carries lists of differing arity",
                        chunk.uid.as_deref().unwrap_or("<new>")
                    ),
                }
            );
            for (i, mnemonic) in chunk_mnemonics.iter().enumerate() {
                if !mnemonics.contains(mnemonic) {
                    mnemonics.push(mnemonic.clone());
                    units.push(chunk_units[i].clone());
                    null_values.push(chunk_nulls[i].clone());
                }
            }
        }
        let columns = ColumnSet::new(mnemonics, units, null_values)?;

        let mut rows = vec![];
        for chunk in chunks {
            let chunk_mnemonics = split_list(&chunk.mnemonic_list);
            let positions: Vec<usize> = chunk_mnemonics
                .iter()
                .map(|m| columns.position(m).expect("mnemonic came from the union"))
                .collect();

            let raw: Vec<Vec<Value>> = serde_json::from_str(&chunk.data).context(PayloadSnafu)?;
            for values in raw {
                validate_row(&values, chunk_mnemonics.len())?;
                let mut mapped = vec![Value::Null; columns.len()];
                for (value, &target) in values.into_iter().zip(&positions) {
                    mapped[target] = value;
                }
                rows.push(Row {
                    values: mapped,
                    chunk_id: chunk.uid.clone(),
                });
            }
        }

        debug!(
            uri = %chunks[0].uri,
            chunks = chunks.len(),
            rows = rows.len(),
            "reassembled record stream",
        );

        Ok(Self::finish(
            chunks[0].uri.clone(),
            chunks[0].indices.clone(),
            columns,
            rows,
        ))
    }

    /// Scan the rows and attach per-channel sub-ranges to the column set.
    fn finish(uri: String, indices: Vec<ChannelIndex>, columns: ColumnSet, rows: Vec<Row>) -> Self {
        let mut ranges: Vec<Option<IndexRange>> = vec![None; columns.len()];
        for row in &rows {
            let index = row.values[0].as_f64().unwrap_or(f64::NAN);
            for (col, range) in ranges.iter_mut().enumerate() {
                let present = col == 0 || !columns.is_null(col, &row.values[col]);
                if present {
                    match range {
                        // Rows are in log order, so the last hit is the end.
                        Some(r) => r.end = index,
                        None => *range = Some(IndexRange::at(index)),
                    }
                }
            }
        }

        Self {
            uri,
            indices,
            columns: Arc::new(columns.with_channel_ranges(ranges)),
            rows,
        }
    }

    /// Project the stream onto a requested mnemonic subset.
    ///
    /// The primary index column is always retained; requested mnemonics the
    /// stream does not carry are skipped. Channel order follows the request.
    pub fn slice(&self, requested: &[String]) -> Self {
        let mut positions = vec![0];
        for mnemonic in requested {
            match self.columns.position(mnemonic) {
                Some(0) | None => {}
                Some(pos) if !positions.contains(&pos) => positions.push(pos),
                Some(_) => {}
            }
        }

        let columns = ColumnSet::new(
            positions
                .iter()
                .map(|&p| self.columns.mnemonics()[p].clone())
                .collect(),
            positions
                .iter()
                .map(|&p| self.columns.units()[p].clone())
                .collect(),
            positions
                .iter()
                .map(|&p| self.columns.null_values()[p].clone())
                .collect(),
        )
        .expect("projected lists keep their arity")
        .with_channel_ranges(
            positions
                .iter()
                .map(|&p| self.columns.channel_range(p))
                .collect(),
        );

        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                values: positions.iter().map(|&p| row.values[p].clone()).collect(),
                chunk_id: row.chunk_id.clone(),
            })
            .collect();

        Self {
            uri: self.uri.clone(),
            indices: self.indices.clone(),
            columns: Arc::new(columns),
            rows,
        }
    }

    /// The primary-index span of the stream, first row to last row.
    pub fn index_range(&self) -> Option<IndexRange> {
        let first = self.rows.first()?.values[0].as_f64()?;
        let last = self.rows.last()?.values[0].as_f64()?;
        Some(IndexRange::new(first, last))
    }

    /// The sub-range spanned by a channel's non-null values.
    pub fn channel_range(&self, mnemonic: &str) -> Option<IndexRange> {
        self.columns
            .position(mnemonic)
            .and_then(|col| self.columns.channel_range(col))
    }

    /// Direction of the primary index.
    pub fn direction(&self) -> Direction {
        self.indices[0].direction
    }

    /// Is the primary index a time index?
    pub fn is_time_index(&self) -> bool {
        self.indices[0].is_time_index
    }

    /// Mnemonic of the primary index.
    pub fn primary_mnemonic(&self) -> &str {
        &self.indices[0].mnemonic
    }

    /// Parent log URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Index descriptors, primary first.
    pub fn indices(&self) -> &[ChannelIndex] {
        &self.indices
    }

    /// Shared column metadata.
    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the stream has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Forward iteration over the rows.
    pub fn records(&self) -> impl Iterator<Item = ChannelDataRecord> + '_ {
        self.rows.iter().map(move |row| {
            ChannelDataRecord::new(
                row.values.clone(),
                row.chunk_id.clone(),
                Arc::clone(&self.columns),
            )
        })
    }

    /// Reverse iteration, for latest-values retrieval.
    pub fn records_reversed(&self) -> impl Iterator<Item = ChannelDataRecord> + '_ {
        self.rows.iter().rev().map(move |row| {
            ChannelDataRecord::new(
                row.values.clone(),
                row.chunk_id.clone(),
                Arc::clone(&self.columns),
            )
        })
    }

    /// Consume the reader into an owned forward record iterator.
    pub fn into_records(self) -> IntoRecords {
        IntoRecords {
            rows: self.rows.into_iter(),
            columns: self.columns,
        }
    }
}

fn validate_row(values: &[Value], arity: usize) -> Result<()> {
    ensure!(
        values.len() == arity,
        InvalidRangeSnafu {
            reason: format!("row has {} values, expected {}", values.len(), arity),
        }
    );
    ensure!(
        values[0].is_number(),
        InvalidRangeSnafu {
            reason: "primary index value is not numeric".to_string(),
        }
    );
    Ok(())
}

/// Owned forward iterator over a reader's rows.
#[derive(Debug)]
pub struct IntoRecords {
    rows: std::vec::IntoIter<Row>,
    columns: Arc<ColumnSet>,
}

impl IntoRecords {
    /// An exhausted record iterator, for merge paths with no stored side.
    pub(crate) fn empty(columns: Arc<ColumnSet>) -> Self {
        Self {
            rows: vec![].into_iter(),
            columns,
        }
    }
}

impl Iterator for IntoRecords {
    type Item = ChannelDataRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(ChannelDataRecord::new(
            row.values,
            row.chunk_id,
            Arc::clone(&self.columns),
        ))
    }
}
