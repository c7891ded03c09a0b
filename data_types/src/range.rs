//! Index directions, scalar index ranges and aligned-extent arithmetic.
//!
//! All index values share one numeric domain: depth indices are plain
//! doubles, time indices are microseconds since the Unix epoch. That keeps
//! range comparisons and extent tiling identical for both index types.

use serde::{Deserialize, Serialize};

/// Direction of a log's primary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Index values grow from record to record.
    Increasing,
    /// Index values shrink from record to record.
    Decreasing,
}

impl Direction {
    /// Construct from the boolean form used by log headers.
    pub fn from_increasing(increasing: bool) -> Self {
        if increasing {
            Self::Increasing
        } else {
            Self::Decreasing
        }
    }

    /// `true` for [`Direction::Increasing`].
    pub fn is_increasing(&self) -> bool {
        matches!(self, Self::Increasing)
    }

    /// The opposite direction.
    pub fn reverse(&self) -> Self {
        match self {
            Self::Increasing => Self::Decreasing,
            Self::Decreasing => Self::Increasing,
        }
    }

    /// Does `a` come strictly before `b` in log order?
    pub fn comes_before(&self, a: f64, b: f64) -> bool {
        match self {
            Self::Increasing => a < b,
            Self::Decreasing => a > b,
        }
    }
}

/// A span on the primary index axis, directed from `start` to `end`.
///
/// `start` and `end` are stored in log order, so for a decreasing log
/// `start >= end`. The containment operations are explicit about whether the
/// end bound is closed ("this index is part of a result") or open ("this
/// index belongs to this chunk"); the start bound is always closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexRange {
    /// First index of the span, in log order.
    pub start: f64,
    /// Last index of the span, in log order.
    pub end: f64,
}

impl IndexRange {
    /// Create a range from bounds already in log order.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The degenerate range covering a single index value.
    pub fn at(value: f64) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    /// Is `value` inside this range?
    ///
    /// The start bound is closed; `closed_end` selects whether the end bound
    /// is closed as well (result membership) or open (chunk membership, where
    /// a value equal to the end belongs to the next chunk).
    pub fn contains(&self, value: f64, direction: Direction, closed_end: bool) -> bool {
        match direction {
            Direction::Increasing => {
                self.start <= value
                    && if closed_end {
                        value <= self.end
                    } else {
                        value < self.end
                    }
            }
            Direction::Decreasing => {
                self.start >= value
                    && if closed_end {
                        value >= self.end
                    } else {
                        value > self.end
                    }
            }
        }
    }

    /// Does this range begin strictly after `value` in log order?
    pub fn starts_after(&self, value: f64, direction: Direction) -> bool {
        direction.comes_before(value, self.start)
    }

    /// Does this range end strictly before `value` in log order?
    pub fn ends_before(&self, value: f64, direction: Direction) -> bool {
        direction.comes_before(self.end, value)
    }

    /// The same span with bounds sorted ascending.
    pub fn min_max(&self) -> Self {
        Self {
            start: self.start.min(self.end),
            end: self.start.max(self.end),
        }
    }

    /// Grow a min/max accumulator range to include `value`.
    ///
    /// Only meaningful on ranges already in min/max form, such as the
    /// per-curve bounds tracked for header updates.
    pub fn widen(&mut self, value: f64) {
        if value < self.start {
            self.start = value;
        }
        if value > self.end {
            self.end = value;
        }
    }

    /// Both bounds are finite numbers.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }
}

/// The aligned extent containing `value`.
///
/// Extents tile the index axis with step `size`, half-open in log direction:
/// a value exactly on a tile boundary belongs to the extent that starts
/// there. Reversing the direction produces the mirror tiling, so for a
/// decreasing log the extent runs from the higher boundary down to the
/// lower, exclusive.
///
/// `size` must be a positive finite number; callers validate configured
/// sizes before chunking starts.
pub fn aligned_extent(value: f64, size: f64, direction: Direction) -> IndexRange {
    debug_assert!(size > 0.0 && size.is_finite());
    match direction {
        Direction::Increasing => {
            let k = (value / size).floor();
            IndexRange::new(k * size, (k + 1.0) * size)
        }
        Direction::Decreasing => {
            let k = (value / size).ceil();
            IndexRange::new(k * size, (k - 1.0) * size)
        }
    }
}

/// Expand `range` outward to the enclosing extent boundaries at both ends.
///
/// Used to widen an update range to the full span of chunks it can touch.
pub fn extent_span(range: IndexRange, size: f64, direction: Direction) -> IndexRange {
    IndexRange::new(
        aligned_extent(range.start, size, direction).start,
        aligned_extent(range.end, size, direction).end,
    )
}
