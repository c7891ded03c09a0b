//! Log header documents and the capability surface the engine needs from
//! them.

use data_types::{Direction, IndexRange};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Name of the document-store collection holding log headers.
pub const LOG_COLLECTION: &str = "log";

/// Kind of a log's primary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogIndexType {
    /// Measured depth; index values are plain doubles.
    Depth,
    /// Date-time; index values are microseconds since the Unix epoch.
    DateTime,
}

impl LogIndexType {
    /// Is this a time index?
    pub fn is_time(&self) -> bool {
        matches!(self, Self::DateTime)
    }
}

/// Per-curve metadata and observed index bounds.
///
/// Depth logs use `min_index`/`max_index`; time logs the ISO-8601 date-time
/// pair. Absent options stand in for the "unspecified" markers of the wire
/// model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCurveInfo {
    /// Curve mnemonic, unique within the log.
    pub mnemonic: String,

    /// Unit of measure.
    #[serde(default)]
    pub unit: String,

    /// Null sentinel literal for this curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_value: Option<String>,

    /// Smallest observed index (depth logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_index: Option<f64>,

    /// Largest observed index (depth logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_index: Option<f64>,

    /// Earliest observed index (time logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date_time_index: Option<String>,

    /// Latest observed index (time logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date_time_index: Option<String>,
}

impl LogCurveInfo {
    /// A curve with no observed bounds yet.
    pub fn new(mnemonic: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            unit: unit.into(),
            null_value: None,
            min_index: None,
            max_index: None,
            min_date_time_index: None,
            max_date_time_index: None,
        }
    }

    /// The curve's observed bounds in min/max form, whichever index type.
    pub fn observed_range(&self) -> Option<IndexRange> {
        match (self.min_index, self.max_index) {
            (Some(min), Some(max)) => Some(IndexRange::new(min, max)),
            _ => {
                let min = self.min_date_time_index.as_deref().and_then(iso_to_micros)?;
                let max = self.max_date_time_index.as_deref().and_then(iso_to_micros)?;
                Some(IndexRange::new(min, max))
            }
        }
    }
}

/// An observed per-curve range handed to [`LogShape::update_header_ranges`].
#[derive(Debug, Clone, PartialEq)]
pub struct CurveRange {
    /// Curve mnemonic.
    pub mnemonic: String,
    /// Unit of measure, used when the curve is new to the header.
    pub unit: String,
    /// Null sentinel, used when the curve is new to the header.
    pub null_value: String,
    /// Observed bounds in min/max form.
    pub range: IndexRange,
}

/// The capability surface the engine needs from a version-specific log
/// object.
///
/// [`LogHeader`] implements it for the native header document; adapters for
/// other WITSML versions can implement it over their own object graphs.
pub trait LogShape {
    /// Is the primary index a time index?
    fn is_time_index(&self) -> bool;

    /// Does the primary index increase?
    fn is_increasing(&self) -> bool;

    /// Mnemonic of the primary index curve.
    fn primary_mnemonic(&self) -> &str;

    /// Channel mnemonics, primary index first.
    fn mnemonics(&self) -> Vec<String>;

    /// Units of measure, parallel to [`LogShape::mnemonics`].
    fn units(&self) -> Vec<String>;

    /// Null sentinels, parallel to [`LogShape::mnemonics`].
    fn null_values(&self) -> Vec<String>;

    /// Fold observed per-curve ranges into the header, widening existing
    /// bounds and keeping the log-level span consistent. Date-time indices
    /// are formatted with `utc_offset_seconds` as observed on the first
    /// reader.
    fn update_header_ranges(&mut self, ranges: &[CurveRange], utc_offset_seconds: Option<i32>);
}

/// A log header document.
///
/// The engine owns only the index-range bookkeeping; everything else is
/// carried for the header's external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogHeader {
    /// Opaque id of the log.
    pub uid: String,

    /// Stable URI; the chunk partition key.
    pub uri: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Parent well id.
    #[serde(default)]
    pub uid_well: String,

    /// Parent wellbore id.
    #[serde(default)]
    pub uid_wellbore: String,

    /// Kind of the primary index.
    pub index_type: LogIndexType,

    /// Direction of the primary index.
    pub direction: Direction,

    /// Mnemonic of the primary index curve.
    pub index_curve: String,

    /// Log-level first index (depth logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<f64>,

    /// Log-level last index (depth logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<f64>,

    /// Log-level first index (time logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time_index: Option<String>,

    /// Log-level last index (time logs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time_index: Option<String>,

    /// Per-curve metadata; the index curve is always present.
    #[serde(default)]
    pub log_curve_info: Vec<LogCurveInfo>,
}

impl LogHeader {
    /// Find a curve by mnemonic.
    pub fn curve(&self, mnemonic: &str) -> Option<&LogCurveInfo> {
        self.log_curve_info.iter().find(|c| c.mnemonic == mnemonic)
    }

    fn curve_mut(&mut self, mnemonic: &str) -> Option<&mut LogCurveInfo> {
        self.log_curve_info
            .iter_mut()
            .find(|c| c.mnemonic == mnemonic)
    }

    /// The log-level span in min/max form, whichever index type.
    pub fn log_range(&self) -> Option<IndexRange> {
        match (self.start_index, self.end_index) {
            (Some(start), Some(end)) => Some(IndexRange::new(start, end).min_max()),
            _ => {
                let start = self
                    .start_date_time_index
                    .as_deref()
                    .and_then(iso_to_micros)?;
                let end = self.end_date_time_index.as_deref().and_then(iso_to_micros)?;
                Some(IndexRange::new(start, end).min_max())
            }
        }
    }
}

impl LogShape for LogHeader {
    fn is_time_index(&self) -> bool {
        self.index_type.is_time()
    }

    fn is_increasing(&self) -> bool {
        self.direction.is_increasing()
    }

    fn primary_mnemonic(&self) -> &str {
        &self.index_curve
    }

    fn mnemonics(&self) -> Vec<String> {
        let mut mnemonics = vec![self.index_curve.clone()];
        for curve in &self.log_curve_info {
            if curve.mnemonic != self.index_curve {
                mnemonics.push(curve.mnemonic.clone());
            }
        }
        mnemonics
    }

    fn units(&self) -> Vec<String> {
        self.mnemonics()
            .iter()
            .map(|m| self.curve(m).map(|c| c.unit.clone()).unwrap_or_default())
            .collect()
    }

    fn null_values(&self) -> Vec<String> {
        self.mnemonics()
            .iter()
            .enumerate()
            .map(|(col, m)| {
                if col == 0 {
                    // The index column has no null sentinel.
                    String::new()
                } else {
                    self.curve(m)
                        .and_then(|c| c.null_value.clone())
                        .unwrap_or_default()
                }
            })
            .collect()
    }

    fn update_header_ranges(&mut self, ranges: &[CurveRange], utc_offset_seconds: Option<i32>) {
        let is_time = self.is_time_index();

        for update in ranges {
            if self.curve(&update.mnemonic).is_none() {
                let mut curve = LogCurveInfo::new(update.mnemonic.clone(), update.unit.clone());
                if !update.null_value.is_empty() {
                    curve.null_value = Some(update.null_value.clone());
                }
                self.log_curve_info.push(curve);
            }
            let curve = self.curve_mut(&update.mnemonic).expect("just inserted");

            let mut observed = update.range;
            if let Some(existing) = curve.observed_range() {
                observed.widen(existing.start);
                observed.widen(existing.end);
            }

            if is_time {
                curve.min_date_time_index = micros_to_iso(observed.start, utc_offset_seconds);
                curve.max_date_time_index = micros_to_iso(observed.end, utc_offset_seconds);
            } else {
                curve.min_index = Some(observed.start);
                curve.max_index = Some(observed.end);
            }
        }

        // Log-level span: union of every affected range and the stored span.
        let mut span: Option<IndexRange> = self.log_range();
        for update in ranges {
            match &mut span {
                Some(span) => {
                    span.widen(update.range.start);
                    span.widen(update.range.end);
                }
                None => span = Some(update.range),
            }
        }
        if let Some(span) = span {
            // Stored in log order.
            let (first, last) = if self.is_increasing() {
                (span.start, span.end)
            } else {
                (span.end, span.start)
            };
            if is_time {
                self.start_date_time_index = micros_to_iso(first, utc_offset_seconds);
                self.end_date_time_index = micros_to_iso(last, utc_offset_seconds);
            } else {
                self.start_index = Some(first);
                self.end_index = Some(last);
            }
        }
    }
}

/// Format an epoch-microseconds index as ISO-8601 with the given offset.
pub fn micros_to_iso(micros: f64, utc_offset_seconds: Option<i32>) -> Option<String> {
    let utc = Utc.timestamp_micros(micros as i64).single()?;
    match utc_offset_seconds.and_then(FixedOffset::east_opt) {
        Some(offset) => Some(utc.with_timezone(&offset).to_rfc3339()),
        None => Some(utc.to_rfc3339()),
    }
}

/// Parse an ISO-8601 date-time into epoch microseconds.
pub fn iso_to_micros(value: &str) -> Option<f64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_micros() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_header() -> LogHeader {
        LogHeader {
            uid: "l1".to_string(),
            uri: "eml://witsml14/well(w1)/wellbore(b1)/log(l1)".to_string(),
            name: "test log".to_string(),
            uid_well: "w1".to_string(),
            uid_wellbore: "b1".to_string(),
            index_type: LogIndexType::Depth,
            direction: Direction::Increasing,
            index_curve: "DEPTH".to_string(),
            start_index: None,
            end_index: None,
            start_date_time_index: None,
            end_date_time_index: None,
            log_curve_info: vec![
                LogCurveInfo::new("DEPTH", "m"),
                LogCurveInfo {
                    null_value: Some("-999.25".to_string()),
                    ..LogCurveInfo::new("GR", "gAPI")
                },
            ],
        }
    }

    #[test]
    fn shape_lists_are_parallel_and_primary_first() {
        let header = depth_header();
        assert_eq!(header.mnemonics(), vec!["DEPTH", "GR"]);
        assert_eq!(header.units(), vec!["m", "gAPI"]);
        assert_eq!(header.null_values(), vec!["", "-999.25"]);
        assert_eq!(header.primary_mnemonic(), "DEPTH");
    }

    #[test]
    fn range_updates_widen_curve_and_log_bounds() {
        let mut header = depth_header();
        header.update_header_ranges(
            &[CurveRange {
                mnemonic: "GR".to_string(),
                unit: "gAPI".to_string(),
                null_value: "-999.25".to_string(),
                range: IndexRange::new(100.0, 300.0),
            }],
            None,
        );

        let gr = header.curve("GR").unwrap();
        assert_eq!(gr.min_index, Some(100.0));
        assert_eq!(gr.max_index, Some(300.0));
        assert_eq!(header.start_index, Some(100.0));
        assert_eq!(header.end_index, Some(300.0));

        // A later narrower write must not shrink anything.
        header.update_header_ranges(
            &[CurveRange {
                mnemonic: "GR".to_string(),
                unit: "gAPI".to_string(),
                null_value: "-999.25".to_string(),
                range: IndexRange::new(200.0, 250.0),
            }],
            None,
        );
        let gr = header.curve("GR").unwrap();
        assert_eq!(gr.min_index, Some(100.0));
        assert_eq!(gr.max_index, Some(300.0));
    }

    #[test]
    fn unknown_curves_are_added_with_their_metadata() {
        let mut header = depth_header();
        header.update_header_ranges(
            &[CurveRange {
                mnemonic: "ROP".to_string(),
                unit: "m/h".to_string(),
                null_value: "-999.25".to_string(),
                range: IndexRange::new(100.0, 200.0),
            }],
            None,
        );

        let rop = header.curve("ROP").unwrap();
        assert_eq!(rop.unit, "m/h");
        assert_eq!(rop.null_value.as_deref(), Some("-999.25"));
        assert_eq!(rop.min_index, Some(100.0));
    }

    #[test]
    fn decreasing_logs_store_bounds_in_log_order() {
        let mut header = LogHeader {
            direction: Direction::Decreasing,
            ..depth_header()
        };
        header.update_header_ranges(
            &[CurveRange {
                mnemonic: "GR".to_string(),
                unit: "gAPI".to_string(),
                null_value: String::new(),
                range: IndexRange::new(100.0, 300.0),
            }],
            None,
        );
        assert_eq!(header.start_index, Some(300.0));
        assert_eq!(header.end_index, Some(100.0));
    }

    #[test]
    fn time_indices_format_with_preserved_offset() {
        let mut header = LogHeader {
            index_type: LogIndexType::DateTime,
            ..depth_header()
        };
        // 2021-06-01T00:00:00Z in microseconds.
        let base = 1_622_505_600_000_000.0;
        header.update_header_ranges(
            &[CurveRange {
                mnemonic: "GR".to_string(),
                unit: "gAPI".to_string(),
                null_value: String::new(),
                range: IndexRange::new(base, base + 60.0 * 1_000_000.0),
            }],
            Some(2 * 3600),
        );

        assert_eq!(
            header.start_date_time_index.as_deref(),
            Some("2021-06-01T02:00:00+02:00")
        );
        assert_eq!(
            header.end_date_time_index.as_deref(),
            Some("2021-06-01T02:01:00+02:00")
        );
        let gr = header.curve("GR").unwrap();
        assert_eq!(
            gr.min_date_time_index.as_deref(),
            Some("2021-06-01T02:00:00+02:00")
        );
    }

    #[test]
    fn iso_round_trip() {
        let micros = 1_622_505_600_000_000.0;
        let iso = micros_to_iso(micros, Some(-5 * 3600)).unwrap();
        assert_eq!(iso_to_micros(&iso), Some(micros));
    }
}
