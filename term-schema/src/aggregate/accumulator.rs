//! Per-group running statistics and their reduction.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::capabilities::capabilities;
use super::compare::{max_value, min_value};
use crate::bson::{BsonType, Value};
use crate::config::AggregateConfig;
use crate::error::{ProfileError, ProfileResult};

/// State computed independently on partitions of the input and combined
/// afterwards.
///
/// Implementations must merge associatively and commutatively; workers see
/// observations in no particular order.
pub trait PartialState: Sized {
    /// Merges several states into one.
    fn merge(states: Vec<Self>) -> ProfileResult<Self>;

    /// Whether the state has seen no input.
    fn is_empty(&self) -> bool;
}

/// The unit of aggregation: a field name together with one of its types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub name: String,
    #[serde(rename = "type")]
    pub bson_type: BsonType,
}

impl GroupKey {
    pub fn new(name: impl Into<String>, bson_type: BsonType) -> Self {
        Self {
            name: name.into(),
            bson_type,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.bson_type)
    }
}

/// Statistics enabled for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatFlags {
    pub min_max_value: bool,
    pub average: bool,
    pub unique_count: bool,
    pub top_n: bool,
    pub bottom_n: bool,
    pub value_histogram: bool,
    pub length_stats: bool,
    pub length_histogram: bool,
    pub weekday_histogram: bool,
    pub hour_histogram: bool,
}

impl StatFlags {
    /// Intersects the requested statistics with what `ty` supports.
    pub fn resolve(ty: BsonType, config: &AggregateConfig) -> ProfileResult<Self> {
        let caps = capabilities(ty)?;
        Ok(Self {
            min_max_value: config.store_min_max_avg_value && caps.min_max,
            average: config.store_min_max_avg_value && caps.average,
            unique_count: config.store_unique_count && caps.frequencies,
            top_n: config.top_n > 0 && caps.frequencies,
            bottom_n: config.bottom_n > 0 && caps.frequencies,
            value_histogram: config.value_histogram_resolution > 0 && caps.value_histogram,
            length_stats: config.store_min_max_avg_length && caps.length,
            length_histogram: config.length_histogram_resolution > 0 && caps.length,
            weekday_histogram: config.store_weekday_histogram && caps.date_parts,
            hour_histogram: config.store_hour_histogram && caps.date_parts,
        })
    }

    /// Whether values must be counted in a frequency table.
    pub fn needs_value_frequencies(&self) -> bool {
        self.unique_count || self.top_n || self.bottom_n || self.value_histogram
    }

    pub fn needs_date_parts(&self) -> bool {
        self.weekday_histogram || self.hour_histogram
    }
}

/// Neumaier-compensated running sum.
///
/// Keeps the rounding error of each addition so that partial sums merged
/// in any order agree with a single pass up to the final rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn add(&mut self, x: f64) {
        let total = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - total) + x;
        } else {
            self.compensation += (x - total) + self.sum;
        }
        self.sum = total;
    }

    pub fn absorb(&mut self, other: CompensatedSum) {
        self.add(other.sum);
        self.compensation += other.compensation;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Running statistics of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub bson_type: BsonType,
    pub flags: StatFlags,
    pub count: u64,
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
    pub value_sum: CompensatedSum,
    /// Number of values that went into `value_sum`.
    pub value_count: u64,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub length_sum: u128,
    pub length_count: u64,
}

impl Accumulator {
    pub fn new(bson_type: BsonType, flags: StatFlags) -> Self {
        Self {
            bson_type,
            flags,
            count: 0,
            min_value: None,
            max_value: None,
            value_sum: CompensatedSum::default(),
            value_count: 0,
            min_length: None,
            max_length: None,
            length_sum: 0,
            length_count: 0,
        }
    }

    /// Records one observation of the group.
    pub fn observe(&mut self, value: Option<&Value>, length: Option<u64>) -> ProfileResult<()> {
        self.count += 1;
        if let Some(value) = value {
            if self.flags.min_max_value {
                self.min_value = Some(min_value(self.bson_type, self.min_value.take(), value)?);
                self.max_value = Some(max_value(self.bson_type, self.max_value.take(), value)?);
            }
            if self.flags.average {
                if let Some(x) = value.as_f64() {
                    self.value_sum.add(x);
                    self.value_count += 1;
                }
            }
        }
        if self.flags.length_stats {
            if let Some(length) = length {
                self.min_length = Some(self.min_length.map_or(length, |m| m.min(length)));
                self.max_length = Some(self.max_length.map_or(length, |m| m.max(length)));
                self.length_sum += u128::from(length);
                self.length_count += 1;
            }
        }
        Ok(())
    }

    /// Folds `other` into `self`. Both must belong to the same group.
    pub fn absorb(&mut self, other: Accumulator) -> ProfileResult<()> {
        self.count += other.count;
        if let Some(min) = other.min_value {
            self.min_value = Some(min_value(self.bson_type, self.min_value.take(), &min)?);
        }
        if let Some(max) = other.max_value {
            self.max_value = Some(max_value(self.bson_type, self.max_value.take(), &max)?);
        }
        self.value_sum.absorb(other.value_sum);
        self.value_count += other.value_count;
        self.min_length = match (self.min_length, other.min_length) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_length = match (self.max_length, other.max_length) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.length_sum += other.length_sum;
        self.length_count += other.length_count;
        Ok(())
    }

    pub fn average_value(&self) -> Option<f64> {
        (self.value_count > 0).then(|| self.value_sum.value() / self.value_count as f64)
    }

    pub fn average_length(&self) -> Option<f64> {
        (self.length_count > 0).then(|| self.length_sum as f64 / self.length_count as f64)
    }
}

/// One worker's private accumulators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatorMap {
    groups: HashMap<GroupKey, Accumulator>,
}

impl AccumulatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulator of `key`, creating it on first use.
    pub fn entry(
        &mut self,
        key: &GroupKey,
        config: &AggregateConfig,
    ) -> ProfileResult<&mut Accumulator> {
        if !self.groups.contains_key(key) {
            let flags = StatFlags::resolve(key.bson_type, config)?;
            self.groups
                .insert(key.clone(), Accumulator::new(key.bson_type, flags));
        }
        self.groups
            .get_mut(key)
            .ok_or_else(|| ProfileError::unknown_type(format!("no accumulator for {key}")))
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Accumulator> {
        self.groups.get(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &Accumulator)> {
        self.groups.iter()
    }

    pub fn into_inner(self) -> HashMap<GroupKey, Accumulator> {
        self.groups
    }
}

impl PartialState for AccumulatorMap {
    fn merge(states: Vec<Self>) -> ProfileResult<Self> {
        let mut merged = AccumulatorMap::new();
        for state in states.into_iter().filter(|s| !s.is_empty()) {
            for (key, acc) in state.groups {
                match merged.groups.entry(key) {
                    Entry::Occupied(mut entry) => entry.get_mut().absorb(acc)?,
                    Entry::Vacant(entry) => {
                        entry.insert(acc);
                    }
                }
            }
        }
        Ok(merged)
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
