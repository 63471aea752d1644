mod common;

use chrono::Duration;
use common::{spread_rows, window_end, LogRow, SimulatedWorkspace};
use logbatch_core::{parse_timestamp, TICK};
use logbatch_query::{
    estimate_size, plan_batches, plan_endpoints, BatchFetcher, BatchLimit, BatchLimits, BatchQuery,
    QueryError, QueryStatus,
};
use std::sync::Arc;

fn request() -> BatchQuery {
    BatchQuery::new("test-workspace", "AppRequests", window_end(), Duration::days(1))
}

fn limits(max_rows: u64, max_bytes: u64) -> BatchLimits {
    BatchLimits { max_rows, max_bytes }
}

#[tokio::test]
async fn merged_endpoints_cover_the_window() {
    let workspace = SimulatedWorkspace::new(spread_rows(1_000));
    let request = request();

    let endpoints = plan_batches(&workspace, &request, &limits(120, 40_000)).await.unwrap();
    let ranges = endpoints.ranges();
    let window = request.window().unwrap();

    assert_eq!(endpoints.end(), Some(window.end));
    assert_eq!(endpoints.earliest(), Some(window.start));
    assert_eq!(ranges.last().unwrap().start, window.start);

    for row in workspace.rows() {
        let holders = ranges.iter().filter(|r| r.contains(row.time)).count();
        assert_eq!(holders, 1, "row at {} covered {} times", row.time, holders);
    }

    for pair in ranges.windows(2) {
        assert_eq!(pair[1].end, pair[0].start - TICK);
        assert!(!pair[0].overlaps(&pair[1]));
    }
}

#[tokio::test]
async fn every_range_respects_both_limits() {
    let workspace = SimulatedWorkspace::new(spread_rows(2_000));
    let request = request();
    let limits = limits(150, 30_000);

    let by_rows = plan_endpoints(&workspace, &request, limits.rows()).await.unwrap();
    let by_bytes = plan_endpoints(&workspace, &request, limits.bytes()).await.unwrap();
    let merged = plan_batches(&workspace, &request, &limits).await.unwrap();

    assert!(merged.batch_count() >= by_rows.batch_count());
    assert!(merged.batch_count() >= by_bytes.batch_count());
    assert!(merged.batch_count() <= by_rows.batch_count() + by_bytes.batch_count());

    // A size bucket closes on the row that crosses the limit, so it may
    // overshoot by at most one row
    let largest_row = workspace.rows().iter().map(|r| r.size).max().unwrap();
    for range in merged.ranges() {
        let rows = workspace.rows_in(range);
        let bytes: u64 = rows.iter().map(|r| r.size).sum();
        assert!(rows.len() as u64 <= limits.max_rows, "{} rows in {}", rows.len(), range);
        assert!(bytes < limits.max_bytes + largest_row, "{} bytes in {}", bytes, range);
    }
}

#[tokio::test]
async fn planning_is_idempotent() {
    let workspace = SimulatedWorkspace::new(spread_rows(800));
    let request = request();
    let limits = limits(90, 25_000);

    let first = plan_batches(&workspace, &request, &limits).await.unwrap();
    let second = plan_batches(&workspace, &request, &limits).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn fetch_returns_every_row_latest_first() {
    let workspace = Arc::new(SimulatedWorkspace::new(spread_rows(1_500)));
    let request = request();

    let endpoints = plan_batches(workspace.as_ref(), &request, &limits(200, 60_000)).await.unwrap();
    let run = BatchFetcher::new(workspace.clone(), 4).fetch(&request, &endpoints).await;

    assert!(run.is_complete());
    assert_eq!(run.batches.len(), endpoints.batch_count());
    assert_eq!(workspace.fetches(), endpoints.batch_count());
    assert_eq!(run.total_rows(), 1_500);

    let times: Vec<_> = run
        .table
        .column_values("TimeGenerated")
        .unwrap()
        .map(|v| parse_timestamp(v.as_str().unwrap()).unwrap())
        .collect();
    assert!(times.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn failed_batch_does_not_abort_the_run() {
    let workspace = Arc::new(SimulatedWorkspace::new(spread_rows(1_000)));
    let request = request();

    let endpoints = plan_batches(workspace.as_ref(), &request, &limits(100, 1_000_000)).await.unwrap();
    let ranges = endpoints.ranges();
    assert!(ranges.len() >= 3);

    let failed = ranges[1];
    workspace.fail_range_starting_at(failed.start);
    let lost = workspace.rows_in(failed).len();

    let run = BatchFetcher::new(workspace.clone(), 5).fetch(&request, &endpoints).await;

    assert_eq!(run.failed(), 1);
    assert_eq!(run.batches[1].outcome.status(), QueryStatus::Failure);
    assert_eq!(run.batches.len(), ranges.len());
    assert_eq!(run.total_rows(), 1_000 - lost);

    let contributed: usize = run.batches.iter().map(|b| b.outcome.num_rows()).sum();
    assert_eq!(run.total_rows(), contributed);
}

#[tokio::test]
async fn partial_results_are_kept() {
    let mut workspace = SimulatedWorkspace::new(spread_rows(799));
    workspace.response_row_cap = Some(50);
    let workspace = Arc::new(workspace);
    let request = request();

    // Limits looser than the service cap force truncated answers
    let endpoints = plan_batches(workspace.as_ref(), &request, &limits(200, 1_000_000)).await.unwrap();
    let run = BatchFetcher::new(workspace.clone(), 2).fetch(&request, &endpoints).await;

    assert_eq!(run.partial(), run.batches.len());
    assert_eq!(run.total_rows(), 50 * run.batches.len());
}

#[tokio::test]
async fn admission_gate_bounds_in_flight_queries() {
    let mut workspace = SimulatedWorkspace::new(spread_rows(1_000));
    workspace.latency = std::time::Duration::from_millis(10);
    let workspace = Arc::new(workspace);
    let request = request();

    let endpoints = plan_batches(workspace.as_ref(), &request, &limits(50, 1_000_000)).await.unwrap();
    assert!(endpoints.batch_count() > 10);

    let run = BatchFetcher::new(workspace.clone(), 3).fetch(&request, &endpoints).await;

    assert!(run.is_complete());
    assert!(workspace.max_in_flight() <= 3);
    assert!(workspace.max_in_flight() >= 1);
}

#[tokio::test]
async fn skewed_timestamps_can_exceed_the_row_limit() {
    let burst = window_end() - Duration::hours(2);
    let mut rows = spread_rows(100);
    rows.extend((0..40).map(|i| LogRow {
        time: burst,
        size: 100,
        message: format!("burst {}", i),
    }));
    let workspace = SimulatedWorkspace::new(rows);

    let endpoints = plan_endpoints(&workspace, &request(), BatchLimit::Rows(25)).await.unwrap();
    let largest = endpoints
        .ranges()
        .into_iter()
        .map(|r| workspace.rows_in(r).len())
        .max()
        .unwrap();

    // Rows sharing one timestamp cannot be split across ranges
    assert!(largest > 25);
}

#[tokio::test]
async fn planning_failure_aborts() {
    let mut workspace = SimulatedWorkspace::new(spread_rows(10));
    workspace.fail_planning = true;

    let err = plan_batches(&workspace, &request(), &BatchLimits::default()).await.unwrap_err();
    assert!(matches!(err, QueryError::Planning { .. }));
    assert_eq!(workspace.fetches(), 0);
}

#[tokio::test]
async fn empty_window_yields_empty_table() {
    let workspace = Arc::new(SimulatedWorkspace::new(Vec::new()));
    let request = request();

    let endpoints = plan_batches(workspace.as_ref(), &request, &BatchLimits::default()).await.unwrap();
    assert_eq!(endpoints.batch_count(), 0);

    let run = BatchFetcher::new(workspace, 5).fetch(&request, &endpoints).await;
    assert!(run.table.is_empty());
    assert!(run.batches.is_empty());
}

#[tokio::test]
async fn size_estimate_matches_window() {
    let workspace = SimulatedWorkspace::new(spread_rows(300));
    let expected_bytes: u64 = workspace.rows().iter().map(|r| r.size).sum();

    let estimate = estimate_size(&workspace, &request()).await.unwrap();
    assert_eq!(estimate.row_count, 300);
    assert_eq!(estimate.total_size_bytes, expected_bytes);
}
