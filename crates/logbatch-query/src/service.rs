//! The remote query service seam and its response model.

use crate::error::{QueryError, Result};
use async_trait::async_trait;
use logbatch_core::{Table, TimeRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A service that runs a query over a time range and returns tables.
///
/// Implementations are expected to retry transient failures themselves;
/// callers issue every request exactly once.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn query(&self, workspace_id: &str, query: &str, range: TimeRange) -> Result<QueryResponse>;
}

/// Error payload returned by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ServiceError>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        for detail in &self.details {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

/// Body of a query response.
///
/// A response carrying tables and an error is a partial result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

impl QueryResponse {
    pub fn success(table: Table) -> Self {
        Self {
            tables: vec![table],
            error: None,
        }
    }

    pub fn partial(table: Table, error: ServiceError) -> Self {
        Self {
            tables: vec![table],
            error: Some(error),
        }
    }

    pub fn status(&self) -> QueryStatus {
        match (&self.error, self.tables.is_empty()) {
            (None, _) => QueryStatus::Success,
            (Some(_), false) => QueryStatus::Partial,
            (Some(_), true) => QueryStatus::Failure,
        }
    }

    /// The first table of the response
    pub fn primary_table(&self) -> Option<&Table> {
        self.tables.first()
    }

    /// Reduce the response to its primary table and status
    pub fn into_outcome(self) -> QueryOutcome {
        let status = self.status();
        let table = self.tables.into_iter().next().unwrap_or_default();
        match (status, self.error) {
            (QueryStatus::Partial, Some(error)) => QueryOutcome::Partial { table, error },
            (QueryStatus::Failure, Some(error)) => QueryOutcome::Failed {
                error: QueryError::Service { status: 200, error },
            },
            _ => QueryOutcome::Success(table),
        }
    }
}

/// Completion status of a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    Partial,
    Failure,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Success => write!(f, "success"),
            QueryStatus::Partial => write!(f, "partial"),
            QueryStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Result of one query as seen by the fetcher
#[derive(Debug)]
pub enum QueryOutcome {
    Success(Table),
    Partial { table: Table, error: ServiceError },
    Failed { error: QueryError },
}

impl QueryOutcome {
    pub fn status(&self) -> QueryStatus {
        match self {
            QueryOutcome::Success(_) => QueryStatus::Success,
            QueryOutcome::Partial { .. } => QueryStatus::Partial,
            QueryOutcome::Failed { .. } => QueryStatus::Failure,
        }
    }

    /// Rows this outcome contributes; `None` for a failure
    pub fn table(&self) -> Option<&Table> {
        match self {
            QueryOutcome::Success(table) | QueryOutcome::Partial { table, .. } => Some(table),
            QueryOutcome::Failed { .. } => None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.table().map(Table::num_rows).unwrap_or(0)
    }
}
