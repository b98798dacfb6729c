//! Aggregation kinds, intervals and the fold over a reading window.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::record::Record;

/// Fold applied to the aggregation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationKind {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggregationKind {
    pub const ALL: [AggregationKind; 5] = [
        AggregationKind::Sum,
        AggregationKind::Avg,
        AggregationKind::Min,
        AggregationKind::Max,
        AggregationKind::Count,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Sum => "SUM",
            AggregationKind::Avg => "AVG",
            AggregationKind::Min => "MIN",
            AggregationKind::Max => "MAX",
            AggregationKind::Count => "COUNT",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CacheError::InvalidArgument(format!("unknown aggregation '{}'", s)))
    }
}

/// Requested interval of an aggregation.
///
/// Recorded in the result only; the window is always folded as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    FifteenMinutes,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::FifteenMinutes,
        Interval::Hourly,
        Interval::Daily,
        Interval::Weekly,
        Interval::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FifteenMinutes => "FIFTEEN_MINUTES",
            Interval::Hourly => "HOURLY",
            Interval::Daily => "DAILY",
            Interval::Weekly => "WEEKLY",
            Interval::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CacheError::InvalidArgument(format!("unknown interval '{}'", s)))
    }
}

/// Outcome of one aggregation query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub subject_id: String,
    pub kind: AggregationKind,
    pub interval: Interval,
    /// `None` iff no reading fell inside the window
    pub value: Option<f64>,
    pub count: usize,
}

/// Folds `field` over `readings`.
///
/// MIN and MAX seed with infinities so any finite reading replaces the seed.
pub(crate) fn fold(readings: &[Record], field_index: usize, kind: AggregationKind) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let values = readings
        .iter()
        .filter_map(|r| r.get_at(field_index).and_then(|v| v.as_f64()));

    let value = match kind {
        AggregationKind::Sum => values.sum(),
        AggregationKind::Avg => values.sum::<f64>() / readings.len() as f64,
        AggregationKind::Min => values.fold(f64::INFINITY, f64::min),
        AggregationKind::Max => values.fold(f64::NEG_INFINITY, f64::max),
        AggregationKind::Count => readings.len() as f64,
    };
    Some(value)
}
