//! Streaming statistics over field observations.
//!
//! Observations are grouped by `(name, type)`. For every group the engine
//! counts occurrences and, depending on [`AggregateConfig`], tracks value
//! and length extremes, frequency rankings and histograms.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::FixedOffset;
//! use term_schema::aggregate::AggregateEngine;
//! use term_schema::bson::{BsonType, Value};
//! use term_schema::config::AggregateConfig;
//! use term_schema::expand::FieldObservation;
//!
//! # async fn example() -> term_schema::error::ProfileResult<()> {
//! let config = AggregateConfig {
//!     store_min_max_avg_value: true,
//!     top_n: 3,
//!     ..AggregateConfig::default()
//! };
//! let engine = AggregateEngine::new(config, FixedOffset::east_opt(0).unwrap());
//! let observations = (0..10)
//!     .map(|i| FieldObservation::new("n", BsonType::Int, 0).with_value(Value::Int32(i % 4)))
//!     .collect();
//! for group in engine.aggregate(observations).await? {
//!     println!("{} {} {}", group.name, group.bson_type, group.count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod capabilities;
pub mod compare;
pub mod engine;
pub mod frequency;
pub mod histogram;
pub mod results;

pub use accumulator::{Accumulator, AccumulatorMap, GroupKey, PartialState, StatFlags};
pub use engine::{AggregateEngine, AggregateStats};
pub use results::{GroupResult, Histogram, HistogramBucket, LengthStats, ValueFrequency, ValueStats};

pub use crate::config::AggregateConfig;
