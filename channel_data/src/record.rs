//! The record model: column metadata shared by a stream, and single rows.

use crate::{InvalidRangeSnafu, Result};
use data_types::IndexRange;
use serde_json::Value;
use snafu::ensure;
use std::sync::Arc;

/// Column metadata shared by every record of one stream.
///
/// Column zero is the primary index; the remaining columns are channels.
/// The three lists are parallel, one entry per column. Each channel also
/// carries the sub-range its non-null values span within the stream, which
/// is what drives per-channel overwrite decisions during a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSet {
    mnemonics: Vec<String>,
    units: Vec<String>,
    null_values: Vec<String>,
    channel_ranges: Vec<Option<IndexRange>>,
}

impl ColumnSet {
    /// Build a column set from parallel lists.
    ///
    /// The channel sub-ranges start empty; the reader fills them in once it
    /// has scanned the rows.
    pub fn new(
        mnemonics: Vec<String>,
        units: Vec<String>,
        null_values: Vec<String>,
    ) -> Result<Self> {
        ensure!(
            !mnemonics.is_empty(),
            InvalidRangeSnafu {
                reason: "mnemonic list is empty".to_string(),
            }
        );
        ensure!(
            mnemonics.len() == units.len() && mnemonics.len() == null_values.len(),
            InvalidRangeSnafu {
                reason: format!(
                    "list arity mismatch: {} mnemonics, {} units, {} null values",
                    mnemonics.len(),
                    units.len(),
                    null_values.len()
                ),
            }
        );

        let channel_ranges = vec![None; mnemonics.len()];
        Ok(Self {
            mnemonics,
            units,
            null_values,
            channel_ranges,
        })
    }

    /// Replace the per-channel sub-ranges.
    pub(crate) fn with_channel_ranges(mut self, channel_ranges: Vec<Option<IndexRange>>) -> Self {
        debug_assert_eq!(channel_ranges.len(), self.mnemonics.len());
        self.channel_ranges = channel_ranges;
        self
    }

    /// Number of columns, including the primary index column.
    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    /// `true` when only the index column exists.
    pub fn is_empty(&self) -> bool {
        self.mnemonics.len() <= 1
    }

    /// Column mnemonics; entry zero is the primary index.
    pub fn mnemonics(&self) -> &[String] {
        &self.mnemonics
    }

    /// Units of measure, parallel to [`Self::mnemonics`].
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Null sentinels, parallel to [`Self::mnemonics`].
    pub fn null_values(&self) -> &[String] {
        &self.null_values
    }

    /// Position of `mnemonic`, if present.
    pub fn position(&self, mnemonic: &str) -> Option<usize> {
        self.mnemonics.iter().position(|m| m == mnemonic)
    }

    /// The sub-range spanned by the channel's non-null values, in log order.
    pub fn channel_range(&self, col: usize) -> Option<IndexRange> {
        self.channel_ranges.get(col).copied().flatten()
    }

    /// Is `value` the null of column `col`?
    ///
    /// JSON `null` always is; otherwise the value is compared against the
    /// column's null sentinel, numerically when both sides parse as numbers.
    pub fn is_null(&self, col: usize, value: &Value) -> bool {
        value_is_null(value, &self.null_values[col])
    }

    /// The column's null sentinel as a JSON value, preserving arity when a
    /// row is serialized. Numeric sentinels stay numeric.
    pub fn null_sentinel(&self, col: usize) -> Value {
        let raw = &self.null_values[col];
        if raw.is_empty() {
            return Value::Null;
        }
        match raw.parse::<f64>() {
            Ok(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            Err(_) => Value::String(raw.clone()),
        }
    }
}

fn value_is_null(value: &Value, sentinel: &str) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => match (n.as_f64(), sentinel.parse::<f64>()) {
            (Some(v), Ok(s)) => v == s,
            _ => false,
        },
        Value::String(s) => !sentinel.is_empty() && s == sentinel,
        _ => false,
    }
}

/// One row of a channel-data stream.
///
/// Holds a single primary index value (column zero), the channel values, and
/// the id of the chunk the row originated from, if any. Column metadata is
/// shared with the owning stream.
#[derive(Debug, Clone)]
pub struct ChannelDataRecord {
    values: Vec<Value>,
    chunk_id: Option<String>,
    columns: Arc<ColumnSet>,
}

impl ChannelDataRecord {
    pub(crate) fn new(values: Vec<Value>, chunk_id: Option<String>, columns: Arc<ColumnSet>) -> Self {
        debug_assert_eq!(values.len(), columns.len());
        Self {
            values,
            chunk_id,
            columns,
        }
    }

    /// The primary index value of this row.
    pub fn index(&self) -> f64 {
        self.values[0].as_f64().unwrap_or(f64::NAN)
    }

    /// Value at `col`.
    pub fn value(&self, col: usize) -> &Value {
        &self.values[col]
    }

    /// All column values, index first.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Id of the chunk this row was read from.
    pub fn chunk_id(&self) -> Option<&str> {
        self.chunk_id.as_deref()
    }

    /// Shared column metadata of the owning stream.
    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    /// The sub-range spanned by channel `col` within the owning stream.
    pub fn channel_index_range(&self, col: usize) -> Option<IndexRange> {
        self.columns.channel_range(col)
    }

    /// Is the value at `col` the channel's null?
    pub fn is_null(&self, col: usize) -> bool {
        self.columns.is_null(col, &self.values[col])
    }

    /// Does the row carry at least one non-null channel value?
    pub fn has_values(&self) -> bool {
        (1..self.values.len()).any(|col| !self.is_null(col))
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Option<String>) {
        (self.values, self.chunk_id)
    }
}

impl PartialEq for ChannelDataRecord {
    /// Records are equal when they sit at the same primary index.
    fn eq(&self, other: &Self) -> bool {
        self.index() == other.index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Arc<ColumnSet> {
        Arc::new(
            ColumnSet::new(
                vec!["DEPTH".into(), "GR".into(), "ROP".into()],
                vec!["m".into(), "gAPI".into(), "m/h".into()],
                vec!["".into(), "-999.25".into(), "-999.25".into()],
            )
            .unwrap(),
        )
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = ColumnSet::new(
            vec!["DEPTH".into(), "GR".into()],
            vec!["m".into()],
            vec!["".into(), "-999.25".into()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("arity"));
    }

    #[test]
    fn null_detection_is_sentinel_aware() {
        let columns = columns();
        assert!(columns.is_null(1, &Value::Null));
        assert!(columns.is_null(1, &json!(-999.25)));
        assert!(columns.is_null(1, &json!("-999.25")));
        assert!(!columns.is_null(1, &json!(10.0)));
    }

    #[test]
    fn record_accessors_and_has_values() {
        let record = ChannelDataRecord::new(
            vec![json!(100.0), json!(-999.25), json!(20.0)],
            Some("c-1".to_string()),
            columns(),
        );
        assert_eq!(record.index(), 100.0);
        assert!(record.is_null(1));
        assert!(!record.is_null(2));
        assert!(record.has_values());
        assert_eq!(record.chunk_id(), Some("c-1"));

        let empty = ChannelDataRecord::new(
            vec![json!(100.0), Value::Null, json!(-999.25)],
            None,
            columns(),
        );
        assert!(!empty.has_values());
    }

    #[test]
    fn record_equality_is_by_index() {
        let a = ChannelDataRecord::new(vec![json!(100.0), json!(1.0), json!(2.0)], None, columns());
        let b = ChannelDataRecord::new(
            vec![json!(100.0), json!(9.0), json!(9.0)],
            Some("x".to_string()),
            columns(),
        );
        assert_eq!(a, b);
    }
}
