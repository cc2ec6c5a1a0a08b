//! Error types for qnet-journal

use chrono::NaiveDateTime;
use thiserror::Error;

/// Journal error type
#[derive(Debug, Error)]
pub enum Error {
    /// Start of a time window after its end
    #[error("Invalid time range: {0}..{1}")]
    InvalidTimeRange(NaiveDateTime, NaiveDateTime),

    /// Export error
    #[error("Export error: {0}")]
    ExportError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, Error>;
