//! Error types for catalog generation.

use thiserror::Error;

/// Failure raised by an individual offset model.
#[derive(Error, Debug)]
pub enum OffsetError {
    #[error("invalid offset parameter: {0}")]
    InvalidParameter(String),
    #[error("offset requires prior delta '{0}' which has not been produced")]
    MissingDelta(String),
}

/// Errors produced while building the index or generating a catalog.
#[derive(Error, Debug)]
pub enum SelfcalError {
    /// Malformed input: wrong angular units, empty catalogs, bad parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("two offsets share the result key '{0}'")]
    DuplicateOffsetKey(String),

    #[error("offset '{key}' returned {actual} deltas for {expected} candidate stars")]
    OffsetLengthMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("offset '{key}' failed: {source}")]
    Offset {
        key: String,
        #[source]
        source: OffsetError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SelfcalError>;
