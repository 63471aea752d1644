//! Batch endpoint planning.
//!
//! A planner asks the service for a running total of one metric (row count or
//! estimated row size) over the window, ordered from the latest row back, and
//! buckets rows by integer-dividing that total by the limit. The earliest
//! timestamp of every bucket becomes a batch endpoint, except for the oldest
//! bucket, which is widened to the window start.
//!
//! Both planners run against the same window and their endpoints are merged,
//! so every resulting sub-range respects both limits. Many rows sharing one
//! timestamp can still push a single bucket past its limit; that case is
//! accepted and not corrected.

use crate::error::{QueryError, Result};
use crate::service::QueryService;
use chrono::Duration;
use logbatch_core::{timestamp_from_value, Endpoints, TimeRange, Timestamp};
use std::fmt;
use tracing::{debug, error, info};

/// Hard row cap of a single service response
pub const SERVICE_MAX_ROWS: u64 = 500_000;

/// Hard size cap of a single service response
pub const SERVICE_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Default share of `SERVICE_MAX_ROWS` used when planning
pub const DEFAULT_ROW_SAFETY: f64 = 0.9;

/// Default share of `SERVICE_MAX_BYTES` used when planning.
///
/// `estimate_data_size` undercounts the serialized response, hence the wider
/// margin.
pub const DEFAULT_BYTE_SAFETY: f64 = 0.6;

/// Default timestamp column of log tables
pub const DEFAULT_TIME_COLUMN: &str = "TimeGenerated";

/// Column the planner query projects its endpoints into
const ENDPOINT_COLUMN: &str = "endpoint";

/// One limit a batch must stay under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchLimit {
    /// Maximum rows per batch
    Rows(u64),
    /// Maximum estimated bytes per batch
    Bytes(u64),
}

impl BatchLimit {
    pub fn value(&self) -> u64 {
        match self {
            BatchLimit::Rows(n) | BatchLimit::Bytes(n) => *n,
        }
    }

    fn metric_expr(&self) -> &'static str {
        match self {
            BatchLimit::Rows(_) => "1",
            BatchLimit::Bytes(_) => "estimate_data_size(*)",
        }
    }
}

impl fmt::Display for BatchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchLimit::Rows(n) => write!(f, "row limit {}", n),
            BatchLimit::Bytes(n) => write!(f, "byte limit {}", n),
        }
    }
}

/// Row and byte limits applied together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_rows: u64,
    pub max_bytes: u64,
}

impl BatchLimits {
    /// Limits derived from service maxima scaled by safety factors in `(0, 1]`
    pub fn with_safety(max_rows: u64, row_safety: f64, max_bytes: u64, byte_safety: f64) -> Result<Self> {
        for (name, factor) in [("row", row_safety), ("byte", byte_safety)] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(QueryError::Config(format!(
                    "{} safety factor must be in (0, 1], got {}",
                    name, factor
                )));
            }
        }

        let limits = Self {
            max_rows: (max_rows as f64 * row_safety) as u64,
            max_bytes: (max_bytes as f64 * byte_safety) as u64,
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 || self.max_bytes == 0 {
            return Err(QueryError::Config(format!(
                "Batch limits must be positive (rows={}, bytes={})",
                self.max_rows, self.max_bytes
            )));
        }
        Ok(())
    }

    pub fn rows(&self) -> BatchLimit {
        BatchLimit::Rows(self.max_rows)
    }

    pub fn bytes(&self) -> BatchLimit {
        BatchLimit::Bytes(self.max_bytes)
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_rows: (SERVICE_MAX_ROWS as f64 * DEFAULT_ROW_SAFETY) as u64,
            max_bytes: (SERVICE_MAX_BYTES as f64 * DEFAULT_BYTE_SAFETY) as u64,
        }
    }
}

/// A base query over a lookback window ending at a fixed time
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    pub workspace_id: String,
    pub query: String,
    pub time_column: String,
    pub end: Timestamp,
    pub lookback: Duration,
}

impl BatchQuery {
    pub fn new(
        workspace_id: impl Into<String>,
        query: impl Into<String>,
        end: Timestamp,
        lookback: Duration,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            query: query.into(),
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            end,
            lookback,
        }
    }

    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = column.into();
        self
    }

    /// The full window `[end - lookback, end]`
    pub fn window(&self) -> Result<TimeRange> {
        Ok(TimeRange::ending_at(self.end, self.lookback)?)
    }
}

/// Build the aggregation query that yields one endpoint per bucket
pub fn planner_query(base: &str, time_column: &str, limit: BatchLimit) -> String {
    format!(
        "{base}\n\
         | extend _batch_metric = {metric}\n\
         | sort by {time} desc\n\
         | extend _batch_num = row_cumsum(_batch_metric) / {limit}\n\
         | summarize {endpoint} = min({time}) by _batch_num\n\
         | sort by _batch_num asc\n\
         | project {endpoint}",
        base = base.trim_end(),
        metric = limit.metric_expr(),
        time = time_column,
        limit = limit.value(),
        endpoint = ENDPOINT_COLUMN,
    )
}

/// Run one planner and return its endpoint list.
///
/// Errors abort planning: the list would not cover the window.
pub async fn plan_endpoints(
    service: &dyn QueryService,
    request: &BatchQuery,
    limit: BatchLimit,
) -> Result<Endpoints> {
    match run_planner(service, request, limit).await {
        Ok(endpoints) => {
            debug!(
                "Planner ({}) produced {} endpoints for {}",
                limit,
                endpoints.len(),
                request.workspace_id
            );
            Ok(endpoints)
        }
        Err(e) => {
            error!("Batch planning with {} failed: {}", limit, e);
            Err(e)
        }
    }
}

async fn run_planner(
    service: &dyn QueryService,
    request: &BatchQuery,
    limit: BatchLimit,
) -> Result<Endpoints> {
    if limit.value() == 0 {
        return Err(QueryError::Config(format!("{} must be positive", limit)));
    }

    let window = request.window()?;
    let query = planner_query(&request.query, &request.time_column, limit);

    let response = service
        .query(&request.workspace_id, &query, window)
        .await
        .map_err(|e| QueryError::Planning {
            limit: limit.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(err) = response.error {
        return Err(QueryError::Planning {
            limit: limit.to_string(),
            reason: format!("incomplete planner result: {}", err),
        });
    }

    let table = response.tables.into_iter().next().unwrap_or_default();
    if table.is_empty() {
        return Ok(Endpoints::new(window.end, Vec::new()));
    }

    let mut boundaries = table
        .column_values(ENDPOINT_COLUMN)?
        .map(timestamp_from_value)
        .collect::<logbatch_core::Result<Vec<_>>>()?;

    // The earliest bucket reaches back to the window start
    if let Some(earliest) = boundaries.iter_mut().min() {
        *earliest = window.start;
    }

    Ok(Endpoints::new(window.end, boundaries))
}

/// Union of two endpoint lists, sorted descending without duplicates
pub fn merge_endpoints(a: &Endpoints, b: &Endpoints) -> Endpoints {
    a.merge(b)
}

/// Run the row and byte planners and merge their endpoints
pub async fn plan_batches(
    service: &dyn QueryService,
    request: &BatchQuery,
    limits: &BatchLimits,
) -> Result<Endpoints> {
    let (by_rows, by_bytes) = tokio::try_join!(
        plan_endpoints(service, request, limits.rows()),
        plan_endpoints(service, request, limits.bytes()),
    )?;

    let merged = merge_endpoints(&by_rows, &by_bytes);
    info!(
        "Planned {} batches ({} by row count, {} by size)",
        merged.batch_count(),
        by_rows.batch_count(),
        by_bytes.batch_count()
    );

    Ok(merged)
}
