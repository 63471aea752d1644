//! Query error types

use crate::service::ServiceError;
use thiserror::Error;

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned error: {status} - {body}")]
    Server { status: u16, body: String },

    #[error("Service error (status {status}): {error}")]
    Service { status: u16, error: ServiceError },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Planning failed for {limit}: {reason}")]
    Planning { limit: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] logbatch_core::CoreError),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
