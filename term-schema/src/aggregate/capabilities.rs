//! Which statistics are meaningful for which BSON type.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::bson::BsonType;
use crate::error::{ProfileError, ProfileResult};

/// Statistics a type supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Running sum and average.
    pub average: bool,
    /// Running minimum and maximum value.
    pub min_max: bool,
    /// Value frequency table: unique count, top and bottom lists.
    pub frequencies: bool,
    pub value_histogram: bool,
    /// Weekday and hour histograms.
    pub date_parts: bool,
    /// Length statistics and length histogram.
    pub length: bool,
}

const AVERAGE: &[BsonType] = &[
    BsonType::Double,
    BsonType::Bool,
    BsonType::Int,
    BsonType::Long,
    BsonType::Decimal,
];

const ORDERED: &[BsonType] = &[
    BsonType::Double,
    BsonType::String,
    BsonType::ObjectId,
    BsonType::Bool,
    BsonType::Date,
    BsonType::Int,
    BsonType::Timestamp,
    BsonType::Long,
    BsonType::Decimal,
];

const HISTOGRAM: &[BsonType] = &[
    BsonType::Double,
    BsonType::Int,
    BsonType::Long,
    BsonType::Decimal,
    BsonType::Date,
];

const LENGTH: &[BsonType] = &[BsonType::String, BsonType::Array, BsonType::Object];

static CAPABILITIES: Lazy<HashMap<BsonType, Capabilities>> = Lazy::new(|| {
    BsonType::ALL
        .iter()
        .map(|ty| {
            let caps = Capabilities {
                average: AVERAGE.contains(ty),
                min_max: ORDERED.contains(ty),
                frequencies: ORDERED.contains(ty),
                value_histogram: HISTOGRAM.contains(ty),
                date_parts: *ty == BsonType::Date,
                length: LENGTH.contains(ty),
            };
            (*ty, caps)
        })
        .collect()
});

/// Looks up the capabilities of `ty`.
pub fn capabilities(ty: BsonType) -> ProfileResult<Capabilities> {
    CAPABILITIES
        .get(&ty)
        .copied()
        .ok_or_else(|| ProfileError::unknown_type(format!("no capabilities for type {ty}")))
}
