//! Bounded concurrent fetching of batch ranges.

use crate::error::QueryError;
use crate::planner::BatchQuery;
use crate::service::{QueryOutcome, QueryService, QueryStatus};
use logbatch_core::{Endpoints, Table, TimeRange};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};

/// Default number of sub-queries allowed in flight
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Receives progress events while a batch run is in progress
pub trait FetchObserver: Send + Sync {
    fn on_batch_complete(&self, result: &BatchSummary);
}

/// Lightweight view of a finished batch handed to observers
#[derive(Debug, Clone, Copy)]
pub struct BatchSummary {
    pub index: usize,
    pub total: usize,
    pub range: TimeRange,
    pub status: QueryStatus,
    pub rows: usize,
}

/// Outcome of one batch
#[derive(Debug)]
pub struct BatchResult {
    pub index: usize,
    pub range: TimeRange,
    pub outcome: QueryOutcome,
}

/// All batch outcomes of a run plus the concatenated table
#[derive(Debug)]
pub struct BatchRun {
    /// Outcomes in range order (latest range first)
    pub batches: Vec<BatchResult>,
    /// Rows of every successful and partial batch, in range order
    pub table: Table,
}

impl BatchRun {
    fn count(&self, status: QueryStatus) -> usize {
        self.batches
            .iter()
            .filter(|b| b.outcome.status() == status)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(QueryStatus::Success)
    }

    pub fn partial(&self) -> usize {
        self.count(QueryStatus::Partial)
    }

    pub fn failed(&self) -> usize {
        self.count(QueryStatus::Failure)
    }

    pub fn total_rows(&self) -> usize {
        self.table.num_rows()
    }

    /// True when every batch returned its complete result
    pub fn is_complete(&self) -> bool {
        self.batches
            .iter()
            .all(|b| b.outcome.status() == QueryStatus::Success)
    }
}

/// Issues one query per batch range with at most `max_concurrency` in flight
pub struct BatchFetcher {
    service: Arc<dyn QueryService>,
    max_concurrency: usize,
    observer: Option<Arc<dyn FetchObserver>>,
}

impl BatchFetcher {
    pub fn new(service: Arc<dyn QueryService>, max_concurrency: usize) -> Self {
        Self {
            service,
            max_concurrency: max_concurrency.max(1),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Fetch every range implied by `endpoints`
    pub async fn fetch(&self, request: &BatchQuery, endpoints: &Endpoints) -> BatchRun {
        self.fetch_ranges(&request.workspace_id, &request.query, endpoints.ranges())
            .await
    }

    /// Fetch the given ranges and concatenate their results in range order.
    ///
    /// A failed batch is logged and contributes no rows; it never stops the
    /// other batches.
    pub async fn fetch_ranges(&self, workspace_id: &str, query: &str, ranges: Vec<TimeRange>) -> BatchRun {
        let total = ranges.len();
        let start = Instant::now();
        info!(
            "Fetching {} batches with up to {} in flight",
            total, self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let workspace_id: Arc<str> = Arc::from(workspace_id);
        let query: Arc<str> = Arc::from(query);
        let mut tasks = JoinSet::new();
        let mut task_index: HashMap<task::Id, usize> = HashMap::with_capacity(total);

        for (index, range) in ranges.iter().copied().enumerate() {
            let service = Arc::clone(&self.service);
            let semaphore = Arc::clone(&semaphore);
            let workspace_id = Arc::clone(&workspace_id);
            let query = Arc::clone(&query);

            let handle = tasks.spawn(async move {
                // Held until the request settles
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = fetch_batch(service.as_ref(), &workspace_id, &query, index, range).await;
                (index, outcome)
            });
            task_index.insert(handle.id(), index);
        }

        let mut outcomes: Vec<Option<QueryOutcome>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let Some(&index) = task_index.get(&e.id()) else {
                        warn!("Untracked batch task did not complete: {}", e);
                        continue;
                    };
                    warn!("Batch {} {} failed: {}", index, ranges[index], e);
                    let error = QueryError::InvalidResponse(format!("batch task did not complete: {}", e));
                    (index, QueryOutcome::Failed { error })
                }
            };

            if let Some(observer) = &self.observer {
                observer.on_batch_complete(&BatchSummary {
                    index,
                    total,
                    range: ranges[index],
                    status: outcome.status(),
                    rows: outcome.num_rows(),
                });
            }
            outcomes[index] = Some(outcome);
        }

        let batches: Vec<BatchResult> = outcomes
            .into_iter()
            .zip(ranges)
            .enumerate()
            .map(|(index, (outcome, range))| BatchResult {
                index,
                range,
                outcome: outcome.unwrap_or_else(|| QueryOutcome::Failed {
                    error: QueryError::InvalidResponse("batch task aborted".to_string()),
                }),
            })
            .collect();

        let table = Table::concat(batches.iter().filter_map(|b| b.outcome.table()));
        let run = BatchRun { batches, table };

        info!(
            "Fetched {} rows from {} batches in {:?} ({} succeeded, {} partial, {} failed)",
            run.total_rows(),
            total,
            start.elapsed(),
            run.succeeded(),
            run.partial(),
            run.failed()
        );

        run
    }
}

async fn fetch_batch(
    service: &dyn QueryService,
    workspace_id: &str,
    query: &str,
    index: usize,
    range: TimeRange,
) -> QueryOutcome {
    let start = Instant::now();
    let outcome = match service.query(workspace_id, query, range).await {
        Ok(response) => response.into_outcome(),
        Err(error) => QueryOutcome::Failed { error },
    };

    match &outcome {
        QueryOutcome::Success(table) => debug!(
            "Batch {} {} returned {} rows in {:?}",
            index,
            range,
            table.num_rows(),
            start.elapsed()
        ),
        QueryOutcome::Partial { table, error } => warn!(
            "Batch {} {} returned a partial result ({} rows): {}",
            index,
            range,
            table.num_rows(),
            error
        ),
        QueryOutcome::Failed { error } => warn!("Batch {} {} failed: {}", index, range, error),
    }

    outcome
}
