//! Decoded BSON values.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

use super::decimal::Decimal128;
use super::types::BsonType;

/// A 12-byte BSON ObjectId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Creation time embedded in the first four bytes, in Unix seconds.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Creation time as Unix milliseconds, the representation used by dates.
    pub fn timestamp_millis(&self) -> i64 {
        i64::from(self.timestamp()) * 1000
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for Decimal128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An ordered list of named values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A decoded BSON value.
///
/// Dates are Unix milliseconds. Timestamps keep their two 32-bit halves.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary { subtype: u8, bytes: Vec<u8> },
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(i64),
    Null,
    Regex { pattern: String, options: String },
    DbPointer { namespace: String, id: ObjectId },
    JavaScript(String),
    Symbol(String),
    JavaScriptWithScope { code: String, scope: Document },
    Int32(i32),
    Timestamp { time: u32, increment: u32 },
    Int64(i64),
    Decimal128(Decimal128),
    MinKey,
    MaxKey,
}

impl Value {
    /// The type tag this value is encoded with.
    pub fn bson_type(&self) -> BsonType {
        match self {
            Value::Double(_) => BsonType::Double,
            Value::String(_) => BsonType::String,
            Value::Document(_) => BsonType::Object,
            Value::Array(_) => BsonType::Array,
            Value::Binary { .. } => BsonType::BinData,
            Value::Undefined => BsonType::Undefined,
            Value::ObjectId(_) => BsonType::ObjectId,
            Value::Boolean(_) => BsonType::Bool,
            Value::DateTime(_) => BsonType::Date,
            Value::Null => BsonType::Null,
            Value::Regex { .. } => BsonType::Regex,
            Value::DbPointer { .. } => BsonType::DbPointer,
            Value::JavaScript(_) => BsonType::Javascript,
            Value::Symbol(_) => BsonType::Symbol,
            Value::JavaScriptWithScope { .. } => BsonType::JavascriptWithScope,
            Value::Int32(_) => BsonType::Int,
            Value::Timestamp { .. } => BsonType::Timestamp,
            Value::Int64(_) => BsonType::Long,
            Value::Decimal128(_) => BsonType::Decimal,
            Value::MinKey => BsonType::MinKey,
            Value::MaxKey => BsonType::MaxKey,
        }
    }

    /// Numeric reading used for sums and histograms. Booleans count as 0/1
    /// and dates as Unix seconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Decimal128(v) => Some(v.to_f64()),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::DateTime(ms) => Some(*ms as f64 / 1000.0),
            _ => None,
        }
    }

    /// Date instant in Unix milliseconds.
    pub fn as_datetime_millis(&self) -> Option<i64> {
        match self {
            Value::DateTime(ms) => Some(*ms),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) | Value::JavaScript(s) | Value::Symbol(s) => f.write_str(s),
            Value::Document(doc) => write!(f, "{{{} fields}}", doc.len()),
            Value::Array(items) => write!(f, "[{} items]", items.len()),
            Value::Binary { subtype, bytes } => {
                write!(f, "BinData({subtype}, {})", hex::encode(bytes))
            }
            Value::Undefined => f.write_str("undefined"),
            Value::ObjectId(id) => write!(f, "{id}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::DateTime(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "Date({ms})"),
            },
            Value::Null => f.write_str("null"),
            Value::Regex { pattern, options } => write!(f, "/{pattern}/{options}"),
            Value::DbPointer { namespace, id } => write!(f, "DBPointer({namespace}, {id})"),
            Value::JavaScriptWithScope { code, .. } => f.write_str(code),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Timestamp { time, increment } => write!(f, "Timestamp({time}, {increment})"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Decimal128(v) => write!(f, "{v}"),
            Value::MinKey => f.write_str("MinKey"),
            Value::MaxKey => f.write_str("MaxKey"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Document(doc) => doc.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Null | Value::Undefined => serializer.serialize_unit(),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            other => serializer.collect_str(other),
        }
    }
}

/// Hashable form of a scalar value, used as a frequency table key.
///
/// Doubles are keyed by their bit pattern with `-0.0` folded into `0.0` and
/// every NaN folded into one canonical NaN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Double(u64),
    String(String),
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(i64),
    Int32(i32),
    Timestamp(u32, u32),
    Int64(i64),
    Decimal128(Decimal128),
}

impl ValueKey {
    /// Builds the key of a scalar value. Compound and valueless types have
    /// no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        let key = match value {
            Value::Double(v) => {
                let canonical = if v.is_nan() {
                    f64::NAN
                } else if *v == 0.0 {
                    0.0
                } else {
                    *v
                };
                ValueKey::Double(canonical.to_bits())
            }
            Value::String(s) => ValueKey::String(s.clone()),
            Value::ObjectId(id) => ValueKey::ObjectId(*id),
            Value::Boolean(v) => ValueKey::Boolean(*v),
            Value::DateTime(ms) => ValueKey::DateTime(*ms),
            Value::Int32(v) => ValueKey::Int32(*v),
            Value::Timestamp { time, increment } => ValueKey::Timestamp(*time, *increment),
            Value::Int64(v) => ValueKey::Int64(*v),
            Value::Decimal128(v) => ValueKey::Decimal128(*v),
            _ => return None,
        };
        Some(key)
    }

    /// Converts the key back into the value it was built from.
    pub fn to_value(&self) -> Value {
        match self {
            ValueKey::Double(bits) => Value::Double(f64::from_bits(*bits)),
            ValueKey::String(s) => Value::String(s.clone()),
            ValueKey::ObjectId(id) => Value::ObjectId(*id),
            ValueKey::Boolean(v) => Value::Boolean(*v),
            ValueKey::DateTime(ms) => Value::DateTime(*ms),
            ValueKey::Int32(v) => Value::Int32(*v),
            ValueKey::Timestamp(time, increment) => Value::Timestamp {
                time: *time,
                increment: *increment,
            },
            ValueKey::Int64(v) => Value::Int64(*v),
            ValueKey::Decimal128(v) => Value::Decimal128(*v),
        }
    }

    /// Numeric reading of the key, for number-like keys only.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ValueKey::Double(bits) => Some(f64::from_bits(*bits)),
            ValueKey::Int32(v) => Some(f64::from(*v)),
            ValueKey::Int64(v) => Some(*v as f64),
            ValueKey::Decimal128(v) => Some(v.to_f64()),
            ValueKey::DateTime(ms) => Some(*ms as f64 / 1000.0),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
