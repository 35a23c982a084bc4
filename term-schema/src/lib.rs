//! # term-schema - Schema Profiling for BSON Collections
//!
//! term-schema infers the structure of a collection of BSON documents. Each
//! document is flattened into per-field observations; observations are grouped
//! by field name and type, and every group gets a count plus optional value
//! and length statistics, frequency rankings and histograms.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use term_schema::prelude::*;
//!
//! # async fn example() -> ProfileResult<()> {
//! let config = ProfileConfig::default()
//!     .with_min_max_avg_value(true)
//!     .with_top_n(3)
//!     .with_value_histogram_resolution(10);
//! let profiler = Profiler::new(config)?;
//!
//! let docs = vec![
//!     DocumentBuilder::new().int32("f1", 5).string("f2", "šašo").build(),
//!     DocumentBuilder::new().int32("f1", 10).int32("f2", 20).build(),
//! ];
//! let (fields, _stats) = profiler.profile_documents(docs).await?;
//! println!("{}", serde_json::to_string_pretty(&fields)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`bson`**: Zero-copy decoder, value model and a small encoder for fixtures
//! - **`expand`**: Flattens one document into ordered [`expand::FieldObservation`]s
//! - **`aggregate`**: Concurrent Collect, Reduce and Derive over observations
//! - **`merge`**: Folds per-type group results into one record per field
//! - **`pipeline`**: Wires the stages together behind [`pipeline::Profiler`]
//! - **`native`**: Typed views of statistics and histogram bounds for renderers
//! - **`config`**, **`error`**, **`logging`**: The usual plumbing
//!
//! Every stage runs on tokio tasks connected by bounded channels. The first
//! failure anywhere aborts the run; a failed run emits no results.

pub mod aggregate;
pub mod bson;
pub mod config;
pub mod error;
pub mod expand;
pub mod logging;
pub mod merge;
pub mod native;
pub mod pipeline;
pub mod prelude;
pub mod workers;
