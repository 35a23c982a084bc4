//! BSON element type tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProfileError, ProfileResult};

/// The type of a BSON element, as stored in its one-byte wire tag.
///
/// Names follow the aliases used by MongoDB's `$type` operator, which is also
/// how types are reported in profiling results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    Double,
    String,
    Object,
    Array,
    BinData,
    Undefined,
    ObjectId,
    Bool,
    Date,
    Null,
    Regex,
    DbPointer,
    Javascript,
    Symbol,
    JavascriptWithScope,
    Int,
    Timestamp,
    Long,
    Decimal,
    MinKey,
    MaxKey,
}

impl BsonType {
    /// Every type tag, in wire tag order.
    pub const ALL: [BsonType; 21] = [
        BsonType::Double,
        BsonType::String,
        BsonType::Object,
        BsonType::Array,
        BsonType::BinData,
        BsonType::Undefined,
        BsonType::ObjectId,
        BsonType::Bool,
        BsonType::Date,
        BsonType::Null,
        BsonType::Regex,
        BsonType::DbPointer,
        BsonType::Javascript,
        BsonType::Symbol,
        BsonType::JavascriptWithScope,
        BsonType::Int,
        BsonType::Timestamp,
        BsonType::Long,
        BsonType::Decimal,
        BsonType::MinKey,
        BsonType::MaxKey,
    ];

    /// Maps a wire tag to its type. Returns `None` for unassigned tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let ty = match tag {
            0x01 => BsonType::Double,
            0x02 => BsonType::String,
            0x03 => BsonType::Object,
            0x04 => BsonType::Array,
            0x05 => BsonType::BinData,
            0x06 => BsonType::Undefined,
            0x07 => BsonType::ObjectId,
            0x08 => BsonType::Bool,
            0x09 => BsonType::Date,
            0x0A => BsonType::Null,
            0x0B => BsonType::Regex,
            0x0C => BsonType::DbPointer,
            0x0D => BsonType::Javascript,
            0x0E => BsonType::Symbol,
            0x0F => BsonType::JavascriptWithScope,
            0x10 => BsonType::Int,
            0x11 => BsonType::Timestamp,
            0x12 => BsonType::Long,
            0x13 => BsonType::Decimal,
            0xFF => BsonType::MinKey,
            0x7F => BsonType::MaxKey,
            _ => return None,
        };
        Some(ty)
    }

    /// The one-byte wire tag.
    pub fn tag(self) -> u8 {
        match self {
            BsonType::Double => 0x01,
            BsonType::String => 0x02,
            BsonType::Object => 0x03,
            BsonType::Array => 0x04,
            BsonType::BinData => 0x05,
            BsonType::Undefined => 0x06,
            BsonType::ObjectId => 0x07,
            BsonType::Bool => 0x08,
            BsonType::Date => 0x09,
            BsonType::Null => 0x0A,
            BsonType::Regex => 0x0B,
            BsonType::DbPointer => 0x0C,
            BsonType::Javascript => 0x0D,
            BsonType::Symbol => 0x0E,
            BsonType::JavascriptWithScope => 0x0F,
            BsonType::Int => 0x10,
            BsonType::Timestamp => 0x11,
            BsonType::Long => 0x12,
            BsonType::Decimal => 0x13,
            BsonType::MinKey => 0xFF,
            BsonType::MaxKey => 0x7F,
        }
    }

    /// The `$type` alias of this type.
    pub fn name(self) -> &'static str {
        match self {
            BsonType::Double => "double",
            BsonType::String => "string",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::BinData => "binData",
            BsonType::Undefined => "undefined",
            BsonType::ObjectId => "objectId",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Null => "null",
            BsonType::Regex => "regex",
            BsonType::DbPointer => "dbPointer",
            BsonType::Javascript => "javascript",
            BsonType::Symbol => "symbol",
            BsonType::JavascriptWithScope => "javascriptWithScope",
            BsonType::Int => "int",
            BsonType::Timestamp => "timestamp",
            BsonType::Long => "long",
            BsonType::Decimal => "decimal",
            BsonType::MinKey => "minKey",
            BsonType::MaxKey => "maxKey",
        }
    }

    /// Whether values of this type are whole numbers.
    pub fn is_integer(self) -> bool {
        matches!(self, BsonType::Int | BsonType::Long)
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BsonType {
    type Err = ProfileError;

    fn from_str(s: &str) -> ProfileResult<Self> {
        BsonType::ALL
            .iter()
            .copied()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| ProfileError::unknown_type(format!("no BSON type named '{s}'")))
    }
}
