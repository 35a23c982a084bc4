//! Output records of the aggregation stage.

use serde::Serialize;

use crate::bson::{BsonType, Value};

/// A single non-empty bucket of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    /// Zero-based bucket index counted from `start`.
    pub index: u64,
    pub count: u64,
}

impl HistogramBucket {
    pub fn new(index: u64, count: u64) -> Self {
        Self { index, count }
    }
}

/// A sparse, evenly spaced histogram.
///
/// Bounds and step are raw doubles; dates are expressed in Unix seconds.
/// Use [`crate::native`] to convert them back to the field's type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub start: f64,
    pub end: f64,
    pub step: f64,
    /// `end - start`.
    pub range: f64,
    pub bucket_count: u64,
    /// Non-empty buckets sorted by index.
    pub buckets: Vec<HistogramBucket>,
}

impl Histogram {
    /// Sum of all bucket counts.
    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// Lower bound of the bucket at `index`.
    pub fn bucket_start(&self, index: u64) -> f64 {
        self.start + index as f64 * self.step
    }
}

/// Minimum, maximum and average of a group's values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueStats {
    pub min: Value,
    pub max: Value,
    /// Only for types with a numeric reading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
}

/// Minimum, maximum and average length of strings, arrays or objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LengthStats {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
}

/// A value and how often it occurred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueFrequency {
    pub value: Value,
    pub count: u64,
}

/// Final statistics of one `(name, type)` group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub name: String,
    #[serde(rename = "type")]
    pub bson_type: BsonType,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_stats: Option<ValueStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_stats: Option<LengthStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Vec<ValueFrequency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Vec<ValueFrequency>>,
    /// Seven counts, Sunday first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday_histogram: Option<Vec<u64>>,
    /// Twenty-four counts in the configured time zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_histogram: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_histogram: Option<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_histogram: Option<Histogram>,
}

impl GroupResult {
    /// A result carrying only the count.
    pub fn new(name: impl Into<String>, bson_type: BsonType, count: u64) -> Self {
        Self {
            name: name.into(),
            bson_type,
            count,
            value_stats: None,
            length_stats: None,
            unique_count: None,
            top: None,
            bottom: None,
            weekday_histogram: None,
            hour_histogram: None,
            value_histogram: None,
            length_histogram: None,
        }
    }
}
