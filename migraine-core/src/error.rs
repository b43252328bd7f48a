//! Error types for migraine-core

use thiserror::Error;

/// Main error type for the migraine-core library
///
/// The analytics functions themselves are total and never produce these.
/// Errors only come from the edges: loading configuration or record
/// exports, and the recompute scheduler.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Record source failed to produce records
    #[error("record source error: {0}")]
    Source(String),

    /// No async runtime available for background recomputation
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Computation was superseded by a newer request
    #[error("computation cancelled")]
    Cancelled,
}

/// Result type alias for migraine-core
pub type Result<T> = std::result::Result<T, Error>;
