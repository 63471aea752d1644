//! logbatch query - batched retrieval from a limit-capped logs-query service
//!
//! A single query over a long window can exceed the service's row or size
//! cap. This crate splits the window into sub-ranges that each stay under
//! both caps and fetches them concurrently:
//!
//! 1. [`planner`]: asks the service for batch endpoints per limit and merges them
//! 2. [`fetcher`]: runs one query per range behind a semaphore and
//!    concatenates the results in range order
//! 3. [`estimator`]: optional row-count / size diagnostic for the window
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use logbatch_query::{plan_batches, BatchFetcher, BatchLimits, BatchQuery, ClientConfig, LogsQueryClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(LogsQueryClient::new(ClientConfig::default())?);
//!     let request = BatchQuery::new("workspace-id", "AppRequests", chrono::Utc::now(), chrono::Duration::days(1));
//!
//!     let endpoints = plan_batches(client.as_ref(), &request, &BatchLimits::default()).await?;
//!     let run = BatchFetcher::new(client, 5).fetch(&request, &endpoints).await;
//!
//!     println!("Fetched {} rows", run.total_rows());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod estimator;
pub mod fetcher;
pub mod planner;
pub mod service;

pub use client::{ClientConfig, LogsQueryClient};
pub use error::{QueryError, Result};
pub use estimator::{estimate_size, SizeEstimate};
pub use fetcher::{BatchFetcher, BatchResult, BatchRun, BatchSummary, FetchObserver, DEFAULT_MAX_CONCURRENCY};
pub use planner::{
    merge_endpoints, plan_batches, plan_endpoints, BatchLimit, BatchLimits, BatchQuery,
};
pub use service::{QueryOutcome, QueryResponse, QueryService, QueryStatus, ServiceError};
