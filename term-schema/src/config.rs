//! Configuration for the expansion and aggregation stages.
//!
//! Values are typically loaded by the caller (CLI flags, a config file) and
//! passed in; every struct deserializes with defaults for missing keys.
//!
//! ```rust
//! use term_schema::config::ProfileConfig;
//!
//! let config = ProfileConfig::default()
//!     .with_concurrency(4)
//!     .with_top_n(5)
//!     .with_value_histogram_resolution(100)
//!     .with_timezone("+02:00");
//! config.validate().unwrap();
//! assert!(config.effective_expand_config().store_value);
//! ```

use chrono::{FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};

/// Options for flattening documents into field observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpandConfig {
    /// Captured strings are cut to this many characters.
    pub string_max_length: usize,
    /// Captured arrays keep at most this many elements.
    pub array_max_length: usize,
    /// Deepest level that is expanded; the root level is 0.
    pub max_depth: u32,
    /// Attach values to observations.
    pub store_value: bool,
    /// Attach the untruncated character count of strings.
    pub store_string_length: bool,
    /// Attach the untruncated element count of arrays.
    pub store_array_length: bool,
    /// Attach the member count of objects.
    pub store_object_length: bool,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            string_max_length: 100,
            array_max_length: 20,
            max_depth: 5,
            store_value: false,
            store_string_length: false,
            store_array_length: false,
            store_object_length: false,
        }
    }
}

/// Which statistics the aggregation stage computes.
///
/// Zero for `top_n`, `bottom_n` or a histogram resolution disables that
/// statistic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateConfig {
    /// Profile objectIds by their embedded creation time.
    pub treat_object_id_as_date: bool,
    pub store_min_max_avg_value: bool,
    pub store_min_max_avg_length: bool,
    pub store_unique_count: bool,
    pub top_n: usize,
    pub bottom_n: usize,
    pub store_weekday_histogram: bool,
    pub store_hour_histogram: bool,
    pub value_histogram_resolution: u32,
    pub length_histogram_resolution: u32,
}

impl AggregateConfig {
    /// Whether any statistic reads observation values.
    pub fn needs_values(&self) -> bool {
        self.store_min_max_avg_value || self.needs_value_frequencies() || self.needs_date_parts()
    }

    /// Whether any statistic reads observation lengths.
    pub fn needs_lengths(&self) -> bool {
        self.store_min_max_avg_length || self.length_histogram_resolution > 0
    }

    /// Whether a value -> count table has to be built.
    pub fn needs_value_frequencies(&self) -> bool {
        self.store_unique_count
            || self.top_n > 0
            || self.bottom_n > 0
            || self.value_histogram_resolution > 0
    }

    /// Whether weekday or hour histograms are requested.
    pub fn needs_date_parts(&self) -> bool {
        self.store_weekday_histogram || self.store_hour_histogram
    }

    /// Whether objectIds should be grouped as dates.
    ///
    /// Only statistics that read the instant (extremes, weekday/hour, value
    /// histogram) trigger the reclassification.
    pub fn reclassify_object_ids(&self) -> bool {
        self.treat_object_id_as_date
            && (self.store_min_max_avg_value
                || self.needs_date_parts()
                || self.value_histogram_resolution > 0)
    }
}

/// Complete configuration of a profiling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileConfig {
    pub expand: ExpandConfig,
    pub aggregate: AggregateConfig,
    /// Number of decode workers and of collect workers.
    pub concurrency: usize,
    /// Capacity of every bounded queue between stages.
    pub channel_capacity: usize,
    /// `"UTC"`, `"local"` or a fixed offset such as `"+02:00"`.
    pub timezone: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            expand: ExpandConfig::default(),
            aggregate: AggregateConfig::default(),
            concurrency: num_cpus::get(),
            channel_capacity: 1024,
            timezone: "UTC".to_string(),
        }
    }
}

impl ProfileConfig {
    /// Creates a configuration that computes every statistic.
    pub fn full() -> Self {
        Self::default()
            .with_min_max_avg_value(true)
            .with_min_max_avg_length(true)
            .with_unique_count(true)
            .with_top_n(10)
            .with_bottom_n(10)
            .with_weekday_histogram(true)
            .with_hour_histogram(true)
            .with_value_histogram_resolution(100)
            .with_length_histogram_resolution(100)
    }

    pub fn with_expand(mut self, expand: ExpandConfig) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateConfig) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.expand.max_depth = max_depth;
        self
    }

    pub fn with_string_max_length(mut self, len: usize) -> Self {
        self.expand.string_max_length = len;
        self
    }

    pub fn with_array_max_length(mut self, len: usize) -> Self {
        self.expand.array_max_length = len;
        self
    }

    pub fn with_object_id_as_date(mut self, enabled: bool) -> Self {
        self.aggregate.treat_object_id_as_date = enabled;
        self
    }

    pub fn with_min_max_avg_value(mut self, enabled: bool) -> Self {
        self.aggregate.store_min_max_avg_value = enabled;
        self
    }

    pub fn with_min_max_avg_length(mut self, enabled: bool) -> Self {
        self.aggregate.store_min_max_avg_length = enabled;
        self
    }

    pub fn with_unique_count(mut self, enabled: bool) -> Self {
        self.aggregate.store_unique_count = enabled;
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.aggregate.top_n = n;
        self
    }

    pub fn with_bottom_n(mut self, n: usize) -> Self {
        self.aggregate.bottom_n = n;
        self
    }

    pub fn with_weekday_histogram(mut self, enabled: bool) -> Self {
        self.aggregate.store_weekday_histogram = enabled;
        self
    }

    pub fn with_hour_histogram(mut self, enabled: bool) -> Self {
        self.aggregate.store_hour_histogram = enabled;
        self
    }

    pub fn with_value_histogram_resolution(mut self, resolution: u32) -> Self {
        self.aggregate.value_histogram_resolution = resolution;
        self
    }

    pub fn with_length_histogram_resolution(mut self, resolution: u32) -> Self {
        self.aggregate.length_histogram_resolution = resolution;
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> ProfileResult<()> {
        if self.concurrency == 0 {
            return Err(ProfileError::invalid_config("concurrency must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(ProfileError::invalid_config(
                "channel capacity must be at least 1",
            ));
        }
        if self.aggregate.value_histogram_resolution == 1 {
            return Err(ProfileError::invalid_config(
                "value histogram resolution must be 0 (disabled) or at least 2",
            ));
        }
        if self.aggregate.length_histogram_resolution == 1 {
            return Err(ProfileError::invalid_config(
                "length histogram resolution must be 0 (disabled) or at least 2",
            ));
        }
        self.time_zone()?;
        Ok(())
    }

    /// Parses the configured time zone into a fixed UTC offset.
    pub fn time_zone(&self) -> ProfileResult<FixedOffset> {
        parse_time_zone(&self.timezone)
    }

    /// Expansion options with value and length capture switched on where
    /// the requested statistics need them.
    pub fn effective_expand_config(&self) -> ExpandConfig {
        let mut expand = self.expand.clone();
        if self.aggregate.needs_values() {
            expand.store_value = true;
        }
        if self.aggregate.needs_lengths() {
            expand.store_string_length = true;
            expand.store_array_length = true;
            expand.store_object_length = true;
        }
        expand
    }
}

/// Parses `"UTC"`, `"Z"`, `"local"` or a `±HH:MM` offset.
pub fn parse_time_zone(zone: &str) -> ProfileResult<FixedOffset> {
    let zone = zone.trim();
    if zone.is_empty() || zone.eq_ignore_ascii_case("utc") || zone == "Z" {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ProfileError::invalid_config("invalid UTC offset"));
    }
    if zone.eq_ignore_ascii_case("local") {
        return Ok(*Local::now().offset());
    }
    zone.parse::<FixedOffset>()
        .map_err(|e| ProfileError::invalid_config(format!("invalid time zone '{zone}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProfileConfig::default();
        assert_eq!(config.expand.string_max_length, 100);
        assert_eq!(config.expand.array_max_length, 20);
        assert_eq!(config.expand.max_depth, 5);
        assert!(!config.expand.store_value);
        assert!(!config.aggregate.needs_values());
        assert!(!config.aggregate.needs_lengths());
        assert!(config.concurrency >= 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_effective_expand_config() {
        let config = ProfileConfig::default().with_top_n(3);
        let expand = config.effective_expand_config();
        assert!(expand.store_value);
        assert!(!expand.store_string_length);

        let config = ProfileConfig::default().with_length_histogram_resolution(10);
        let expand = config.effective_expand_config();
        assert!(!expand.store_value);
        assert!(expand.store_string_length && expand.store_array_length);
        assert!(expand.store_object_length);
    }

    #[test]
    fn test_object_id_reclassification_needs_date_statistic() {
        let config = ProfileConfig::default().with_object_id_as_date(true);
        assert!(!config.aggregate.reclassify_object_ids());
        let config = config.with_hour_histogram(true);
        assert!(config.aggregate.reclassify_object_ids());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ProfileConfig::default().with_concurrency(0).validate().is_err());
        assert!(ProfileConfig::default()
            .with_channel_capacity(0)
            .validate()
            .is_err());
        assert!(ProfileConfig::default()
            .with_value_histogram_resolution(1)
            .validate()
            .is_err());
        assert!(ProfileConfig::default()
            .with_timezone("Mars/Olympus")
            .validate()
            .is_err());
    }

    #[test]
    fn test_time_zones() {
        assert_eq!(parse_time_zone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_time_zone("+02:00").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_time_zone("-05:30").unwrap().local_minus_utc(), -19800);
        assert!(parse_time_zone("local").is_ok());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: ProfileConfig = serde_json::from_str(
            r#"{"expand": {"maxDepth": 2}, "aggregate": {"topN": 4}, "timezone": "+01:00"}"#,
        )
        .unwrap();
        assert_eq!(config.expand.max_depth, 2);
        assert_eq!(config.expand.array_max_length, 20);
        assert_eq!(config.aggregate.top_n, 4);
        assert_eq!(config.time_zone().unwrap().local_minus_utc(), 3600);
    }
}
