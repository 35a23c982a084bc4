//! Native representations of statistics for renderers.
//!
//! Histograms store their bounds as raw doubles (dates in Unix seconds).
//! The functions here turn them back into values of the field's type, with
//! dates placed in a caller-supplied time zone.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Serialize, Serializer};

use crate::aggregate::{GroupResult, Histogram};
use crate::bson::{BsonType, Decimal128, ObjectId, Value};

/// A statistic in the form a renderer shows it.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Integer(i64),
    Float(f64),
    Decimal(Decimal128),
    Bool(bool),
    Text(String),
    ObjectId(ObjectId),
    Date(DateTime<FixedOffset>),
    /// Width of a date bucket.
    Duration(Duration),
    Timestamp { time: u32, increment: u32 },
    /// Anything without a dedicated native form, rendered as text.
    Other(String),
}

impl NativeValue {
    /// Converts a decoded value; dates are placed in `tz`.
    pub fn from_value(value: &Value, tz: &FixedOffset) -> Self {
        match value {
            Value::Double(v) => NativeValue::Float(*v),
            Value::Int32(v) => NativeValue::Integer(i64::from(*v)),
            Value::Int64(v) => NativeValue::Integer(*v),
            Value::Decimal128(v) => NativeValue::Decimal(*v),
            Value::Boolean(v) => NativeValue::Bool(*v),
            Value::String(s) => NativeValue::Text(s.clone()),
            Value::ObjectId(id) => NativeValue::ObjectId(*id),
            Value::DateTime(ms) => match date_from_millis(*ms, tz) {
                Some(date) => NativeValue::Date(date),
                None => NativeValue::Integer(*ms),
            },
            Value::Timestamp { time, increment } => NativeValue::Timestamp {
                time: *time,
                increment: *increment,
            },
            other => NativeValue::Other(other.to_string()),
        }
    }

    /// Converts a raw histogram bound of a field of type `ty`.
    ///
    /// Dates are read as Unix seconds. Returns `None` for types without a
    /// numeric reading or for values out of the type's range.
    pub fn from_raw(ty: BsonType, raw: f64, tz: &FixedOffset) -> Option<Self> {
        if !raw.is_finite() && ty != BsonType::Double {
            return None;
        }
        match ty {
            BsonType::Double => Some(NativeValue::Float(raw)),
            BsonType::Int => {
                let rounded = raw.round();
                (rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX))
                    .then_some(NativeValue::Integer(rounded as i64))
            }
            BsonType::Long => {
                let rounded = raw.round();
                (rounded >= i64::MIN as f64 && rounded < i64::MAX as f64)
                    .then_some(NativeValue::Integer(rounded as i64))
            }
            BsonType::Decimal => Decimal128::from_f64(raw).map(NativeValue::Decimal),
            BsonType::Date => {
                date_from_millis((raw * 1000.0).round() as i64, tz).map(NativeValue::Date)
            }
            _ => None,
        }
    }

    /// Converts a raw histogram step; date steps become durations.
    pub fn step(ty: BsonType, raw: f64, tz: &FixedOffset) -> Option<Self> {
        match ty {
            BsonType::Date => raw
                .is_finite()
                .then(|| Duration::milliseconds((raw * 1000.0).round() as i64))
                .map(NativeValue::Duration),
            _ => Self::from_raw(ty, raw, tz),
        }
    }
}

fn date_from_millis(ms: i64, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(tz))
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Integer(v) => write!(f, "{v}"),
            NativeValue::Float(v) => write!(f, "{v}"),
            NativeValue::Decimal(v) => write!(f, "{v}"),
            NativeValue::Bool(v) => write!(f, "{v}"),
            NativeValue::Text(s) | NativeValue::Other(s) => f.write_str(s),
            NativeValue::ObjectId(id) => write!(f, "{id}"),
            NativeValue::Date(date) => write!(f, "{}", date.to_rfc3339()),
            NativeValue::Duration(d) => write!(f, "{}s", d.num_milliseconds() as f64 / 1000.0),
            NativeValue::Timestamp { time, increment } => {
                write!(f, "Timestamp({time}, {increment})")
            }
        }
    }
}

impl Serialize for NativeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NativeValue::Integer(v) => serializer.serialize_i64(*v),
            NativeValue::Float(v) => serializer.serialize_f64(*v),
            NativeValue::Bool(v) => serializer.serialize_bool(*v),
            NativeValue::Date(date) => date.serialize(serializer),
            NativeValue::Duration(d) => serializer.serialize_i64(d.num_milliseconds()),
            other => serializer.collect_str(other),
        }
    }
}

/// A bucket with its native lower bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeBucket {
    pub lower: NativeValue,
    pub count: u64,
}

/// A histogram with native bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeHistogram {
    pub start: NativeValue,
    pub end: NativeValue,
    pub step: NativeValue,
    pub buckets: Vec<NativeBucket>,
}

impl NativeHistogram {
    /// Converts the value histogram of a field of type `ty`.
    pub fn from_histogram(ty: BsonType, histogram: &Histogram, tz: &FixedOffset) -> Option<Self> {
        let buckets = histogram
            .buckets
            .iter()
            .map(|bucket| {
                NativeValue::from_raw(ty, histogram.bucket_start(bucket.index), tz).map(|lower| {
                    NativeBucket {
                        lower,
                        count: bucket.count,
                    }
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            start: NativeValue::from_raw(ty, histogram.start, tz)?,
            end: NativeValue::from_raw(ty, histogram.end, tz)?,
            step: NativeValue::step(ty, histogram.step, tz)?,
            buckets,
        })
    }

    /// Converts a length histogram; lengths are always integers.
    pub fn from_length_histogram(histogram: &Histogram, tz: &FixedOffset) -> Option<Self> {
        Self::from_histogram(BsonType::Long, histogram, tz)
    }
}

/// Native views of one group's value statistics and histograms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<NativeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<NativeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_histogram: Option<NativeHistogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_histogram: Option<NativeHistogram>,
}

impl NativeGroup {
    pub fn from_group(group: &GroupResult, tz: &FixedOffset) -> Self {
        let stats = group.value_stats.as_ref();
        Self {
            min: stats.map(|s| NativeValue::from_value(&s.min, tz)),
            max: stats.map(|s| NativeValue::from_value(&s.max, tz)),
            value_histogram: group
                .value_histogram
                .as_ref()
                .and_then(|h| NativeHistogram::from_histogram(group.bson_type, h, tz)),
            length_histogram: group
                .length_histogram
                .as_ref()
                .and_then(|h| NativeHistogram::from_length_histogram(h, tz)),
        }
    }
}
