//! Error types for logbatch-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid time range: start {start} > end {end}")]
    InvalidTimeRange { start: String, end: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
