//! In-process stand-in for a logs workspace.
//!
//! Understands the three query shapes this crate sends: planner
//! aggregations, the size summary and plain range-scoped queries.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use logbatch_core::{format_timestamp, Column, Table, TimeRange, Timestamp};
use logbatch_query::{QueryError, QueryResponse, QueryService, Result, ServiceError};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct LogRow {
    pub time: Timestamp,
    pub size: u64,
    pub message: String,
}

pub struct SimulatedWorkspace {
    rows: Vec<LogRow>,
    /// Rows returned before a response is cut short as partial
    pub response_row_cap: Option<usize>,
    /// Fetches whose range starts at one of these fail outright
    failing_starts: Mutex<HashSet<Timestamp>>,
    pub fail_planning: bool,
    pub latency: std::time::Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

pub fn window_end() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// `count` rows with distinct timestamps spread over the day before `window_end`
pub fn spread_rows(count: usize) -> Vec<LogRow> {
    let step_ms = (Duration::days(1).num_milliseconds() - 1_000) / count as i64;
    (0..count)
        .map(|i| LogRow {
            time: window_end() - Duration::milliseconds(500 + i as i64 * step_ms),
            size: 200 + (i as u64 * 37) % 900,
            message: format!("request {}", i),
        })
        .collect()
}

impl SimulatedWorkspace {
    pub fn new(rows: Vec<LogRow>) -> Self {
        Self {
            rows,
            response_row_cap: None,
            failing_starts: Mutex::new(HashSet::new()),
            fail_planning: false,
            latency: std::time::Duration::from_millis(2),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn fail_range_starting_at(&self, start: Timestamp) {
        self.failing_starts.lock().unwrap().insert(start);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn rows_in(&self, range: TimeRange) -> Vec<&LogRow> {
        let mut rows: Vec<&LogRow> = self.rows.iter().filter(|r| range.contains(r.time)).collect();
        rows.sort_by(|a, b| b.time.cmp(&a.time));
        rows
    }

    fn planner(&self, query: &str, range: TimeRange) -> Result<QueryResponse> {
        if self.fail_planning {
            return Err(QueryError::Server {
                status: 400,
                body: "planner rejected".to_string(),
            });
        }

        let limit: u64 = query
            .split("row_cumsum(_batch_metric) / ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .expect("planner query carries a limit");
        let by_bytes = query.contains("estimate_data_size(*)");

        let mut cumulative = 0u64;
        let mut buckets: BTreeMap<u64, Timestamp> = BTreeMap::new();
        for row in self.rows_in(range) {
            cumulative += if by_bytes { row.size } else { 1 };
            let bucket = buckets.entry(cumulative / limit).or_insert(row.time);
            if row.time < *bucket {
                *bucket = row.time;
            }
        }

        let table = Table::new("PrimaryResult", vec![Column::new("endpoint", "datetime")]).with_rows(
            buckets
                .values()
                .map(|ts| vec![json!(format_timestamp(*ts))])
                .collect(),
        );
        Ok(QueryResponse::success(table))
    }

    fn summary(&self, range: TimeRange) -> QueryResponse {
        let rows = self.rows_in(range);
        let bytes: u64 = rows.iter().map(|r| r.size).sum();
        QueryResponse::success(
            Table::new(
                "PrimaryResult",
                vec![Column::new("row_count", "long"), Column::new("total_size_bytes", "long")],
            )
            .with_rows(vec![vec![json!(rows.len()), json!(bytes)]]),
        )
    }

    fn fetch(&self, range: TimeRange) -> Result<QueryResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing_starts.lock().unwrap().contains(&range.start) {
            return Err(QueryError::Service {
                status: 503,
                error: ServiceError::new("ServiceUnavailable", "try again later"),
            });
        }

        let rows = self.rows_in(range);
        let columns = vec![
            Column::new("TimeGenerated", "datetime"),
            Column::new("Message", "string"),
            Column::new("Size", "long"),
        ];
        let to_row = |r: &&LogRow| vec![json!(format_timestamp(r.time)), json!(r.message), json!(r.size)];

        match self.response_row_cap {
            Some(cap) if rows.len() > cap => Ok(QueryResponse::partial(
                Table::new("PrimaryResult", columns).with_rows(rows.iter().take(cap).map(to_row).collect()),
                ServiceError::new("PartialError", "Query result set has exceeded the internal record count limit"),
            )),
            _ => Ok(QueryResponse::success(
                Table::new("PrimaryResult", columns).with_rows(rows.iter().map(to_row).collect()),
            )),
        }
    }
}

#[async_trait]
impl QueryService for SimulatedWorkspace {
    async fn query(&self, _workspace_id: &str, query: &str, range: TimeRange) -> Result<QueryResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if query.contains("row_cumsum(") {
            self.planner(query, range)
        } else if query.contains("summarize row_count = count()") {
            Ok(self.summary(range))
        } else {
            self.fetch(range)
        }
    }
}
