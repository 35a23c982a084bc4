//! Error types for the schema profiler.

use thiserror::Error;

/// Result type for profiler operations.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Errors that can abort a profiling run.
///
/// None of these are recoverable inside the engine. A run that hits any of
/// them is aborted as a whole and produces no field results.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// A document buffer violated the binary format.
    #[error("Corrupted document at offset {offset}: {reason}")]
    CorruptedDocument { offset: usize, reason: String },

    /// A queue with an element type the engine cannot consume.
    #[error("Unsupported input shape: {type_name}")]
    UnsupportedInput { type_name: &'static str },

    /// A type tag with no comparator or capability entry.
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Invalid configuration or parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProfileError {
    /// Creates a corrupted document error at the given cursor offset.
    pub fn corrupted(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptedDocument {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates an unsupported input error naming the offending element type.
    pub fn unsupported_input<T: ?Sized>() -> Self {
        Self::UnsupportedInput {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Creates an unknown type error with the given message.
    pub fn unknown_type(msg: impl Into<String>) -> Self {
        Self::UnknownType(msg.into())
    }

    /// Creates an invalid configuration error with the given message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Returns true if the error was caused by the input data rather than by
    /// the caller or the engine itself.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::CorruptedDocument { .. })
    }
}

impl From<tokio::task::JoinError> for ProfileError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
