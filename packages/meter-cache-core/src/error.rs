//! Cache error types.

use thiserror::Error;

/// Cache operation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Schema source unreadable, malformed or empty
    #[error("Schema error: {0}")]
    Schema(String),

    /// Local and remote schema hashes differ
    #[error("Schema mismatch: local {local}, remote {remote}")]
    SchemaMismatch { local: String, remote: String },

    /// Record kind not present in the loaded schema (or schema not loaded)
    #[error("Unknown model '{model}'")]
    UnknownModel { model: String },

    /// Field not declared by the record kind
    #[error("Unknown field '{field}' in model '{model}'")]
    UnknownField { model: String, field: String },

    /// Required field absent from an ingested record
    #[error("Missing field '{field}' in model '{model}'")]
    MissingField { model: String, field: String },

    /// Value type does not match the declared field type
    #[error("Type mismatch for '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    /// Truncated or corrupt encoded data
    #[error("Codec error: {0}")]
    Codec(String),

    /// External store call failed or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Shorthand for a codec failure.
    pub(crate) fn codec(message: impl Into<String>) -> Self {
        CacheError::Codec(message.into())
    }

    /// Shorthand for a schema failure.
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        CacheError::Schema(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
