//! Minimal BSON support: type tags, values, a bounds-checked decoder and an
//! encoder for building input documents.
//!
//! The decoder is the only piece on the profiling hot path. It works on
//! borrowed buffers and never allocates for the structural walk itself.

pub mod decimal;
pub mod decoder;
pub mod encoder;
pub mod types;
pub mod value;

pub use decimal::Decimal128;
pub use decoder::Decoder;
pub use encoder::DocumentBuilder;
pub use types::BsonType;
pub use value::{Document, ObjectId, Value, ValueKey};
