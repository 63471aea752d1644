//! Advisory size estimate for a query window.

use crate::error::{QueryError, Result};
use crate::planner::{BatchLimits, BatchQuery};
use crate::service::{QueryService, QueryStatus};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Row count and estimated byte size of a query over its window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub row_count: u64,
    pub total_size_bytes: u64,
}

impl SizeEstimate {
    /// Lower bound on the batches needed by each limit (rows, bytes)
    pub fn min_batches(&self, limits: &BatchLimits) -> (u64, u64) {
        (
            self.row_count.div_ceil(limits.max_rows.max(1)),
            self.total_size_bytes.div_ceil(limits.max_bytes.max(1)),
        )
    }
}

/// Build the summarize query behind [`estimate_size`]
pub fn estimate_query(base: &str) -> String {
    format!(
        "{}\n| summarize row_count = count(), total_size_bytes = sum(estimate_data_size(*))",
        base.trim_end()
    )
}

/// Ask the service for the row count and estimated size of the window.
///
/// Purely diagnostic: the result never influences batch planning.
pub async fn estimate_size(service: &dyn QueryService, request: &BatchQuery) -> Result<SizeEstimate> {
    let window = request.window()?;
    let response = service
        .query(&request.workspace_id, &estimate_query(&request.query), window)
        .await?;

    match (response.status(), &response.error) {
        (QueryStatus::Failure, Some(error)) => {
            return Err(QueryError::Service {
                status: 200,
                error: error.clone(),
            })
        }
        (QueryStatus::Partial, Some(error)) => {
            warn!("Size estimate for {} is incomplete: {}", window, error)
        }
        _ => {}
    }

    let table = response
        .primary_table()
        .ok_or_else(|| QueryError::InvalidResponse("size estimate returned no table".to_string()))?;
    let row = table.rows.first();

    let read = |column: &str| -> Result<u64> {
        let idx = table.column_index(column).ok_or_else(|| {
            QueryError::InvalidResponse(format!("size estimate is missing column {}", column))
        })?;
        Ok(row.and_then(|r| r.get(idx)).map(as_count).unwrap_or(0))
    };

    let estimate = SizeEstimate {
        row_count: read("row_count")?,
        total_size_bytes: read("total_size_bytes")?,
    };

    info!(
        "Window {} holds {} rows, ~{:.2} MiB",
        window,
        estimate.row_count,
        estimate.total_size_bytes as f64 / (1024.0 * 1024.0)
    );

    Ok(estimate)
}

fn as_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
