//! Prelude for commonly used types in term-schema.

pub use crate::aggregate::{AggregateEngine, GroupResult, Histogram, PartialState};
pub use crate::bson::{BsonType, DocumentBuilder, Value};
pub use crate::config::{AggregateConfig, ExpandConfig, ProfileConfig};
pub use crate::error::{ProfileError, ProfileResult};
pub use crate::expand::{Expander, FieldObservation};
pub use crate::logging::LogConfig;
pub use crate::merge::{FieldResult, FieldMerger};
pub use crate::pipeline::{Profiler, RunStats};
