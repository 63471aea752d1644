//! Time types shared by the planner and the fetcher

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC timestamp as understood by the logs-query service
pub type Timestamp = DateTime<Utc>;

/// Smallest representable time unit of the service (one 100ns tick).
///
/// Adjacent batch ranges are separated by exactly one tick.
pub const TICK: Duration = Duration::nanoseconds(100);

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(s: &str) -> Result<Timestamp> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp(format!("{}: {}", s, e)))
}

/// Format a timestamp the way the service expects it in timespans and literals
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Read a timestamp out of a result cell
pub fn timestamp_from_value(value: &serde_json::Value) -> Result<Timestamp> {
    match value {
        serde_json::Value::String(s) => parse_timestamp(s),
        other => Err(CoreError::InvalidTimestamp(format!(
            "expected datetime string, got {}",
            other
        ))),
    }
}

/// Parse a duration string such as "90s", "15m", "6h", "1d" or "2w"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CoreError::InvalidDuration("Empty duration".to_string()));
    }

    let (num_str, unit_ms): (&str, i64) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600 * 1_000)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86_400 * 1_000)
    } else if let Some(n) = s.strip_suffix('w') {
        (n, 604_800 * 1_000)
    } else {
        return Err(CoreError::InvalidDuration(format!(
            "Invalid duration unit: {}",
            s
        )));
    };

    let num: i64 = num_str
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidDuration(format!("Invalid number: {}", num_str)))?;
    if num < 0 {
        return Err(CoreError::InvalidDuration(format!(
            "Negative duration: {}",
            s
        )));
    }

    num.checked_mul(unit_ms)
        .and_then(Duration::try_milliseconds)
        .ok_or_else(|| CoreError::InvalidDuration(format!("Duration out of range: {}", s)))
}

/// A query window with both bounds inclusive.
///
/// The service evaluates a timespan `start/end` inclusively, which is why
/// adjacent batch ranges are offset by one `TICK` instead of sharing a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive)
    pub start: Timestamp,
    /// End timestamp (inclusive)
    pub end: Timestamp,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start > end {
            return Err(CoreError::InvalidTimeRange {
                start: format_timestamp(start),
                end: format_timestamp(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Window of `lookback` ending at `end`
    pub fn ending_at(end: Timestamp, lookback: Duration) -> Result<Self> {
        let start = end
            .checked_sub_signed(lookback)
            .ok_or_else(|| CoreError::InvalidDuration(format!("Lookback too large: {}", lookback)))?;
        Self::new(start, end)
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Check if this range shares any instant with another
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Length of the range
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// ISO 8601 interval sent to the service (`start/end`)
    pub fn to_timespan(&self) -> String {
        format!(
            "{}/{}",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Descending batch boundaries for one query window.
///
/// The first element is the overall end of the window, every following
/// element is the earliest timestamp of one batch. Consecutive pairs define
/// the sub-ranges returned by [`Endpoints::ranges`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    points: Vec<Timestamp>,
}

impl Endpoints {
    /// Build the endpoint list for a window ending at `end`.
    ///
    /// Boundaries after `end` are ignored; duplicates collapse.
    pub fn new(end: Timestamp, boundaries: impl IntoIterator<Item = Timestamp>) -> Self {
        let mut points: Vec<Timestamp> = boundaries.into_iter().filter(|ts| *ts <= end).collect();
        points.push(end);
        Self::from_unsorted(points)
    }

    /// Sort descending, drop duplicates and fold boundaries that sit less
    /// than one `TICK` after the next one into it. The fold keeps the earlier
    /// point so the list still reaches back as far.
    fn from_unsorted(mut points: Vec<Timestamp>) -> Self {
        points.sort_unstable_by(|a, b| b.cmp(a));
        points.dedup();

        let mut folded: Vec<Timestamp> = Vec::with_capacity(points.len());
        for point in points {
            match folded.len() {
                // The first range ends at the window end itself, without a TICK gap
                0 | 1 => folded.push(point),
                n if folded[n - 1] - point < TICK => folded[n - 1] = point,
                _ => folded.push(point),
            }
        }
        Self { points: folded }
    }

    /// Union of two endpoint lists, sorted descending without duplicates
    pub fn merge(&self, other: &Endpoints) -> Endpoints {
        Self::from_unsorted(
            self.points
                .iter()
                .chain(other.points.iter())
                .copied()
                .collect(),
        )
    }

    /// Overall end of the window
    pub fn end(&self) -> Option<Timestamp> {
        self.points.first().copied()
    }

    /// Start of the earliest batch
    pub fn earliest(&self) -> Option<Timestamp> {
        self.points.last().copied()
    }

    pub fn as_slice(&self) -> &[Timestamp] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of sub-queries the list implies
    pub fn batch_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Sub-ranges for consecutive endpoint pairs, latest first.
    ///
    /// `[T0, T1, T2]` yields `[T1, T0]` and `[T2, T1 - TICK]`. Every range
    /// is non-empty since boundaries below the first are at least a `TICK`
    /// apart.
    pub fn ranges(&self) -> Vec<TimeRange> {
        self.points
            .windows(2)
            .enumerate()
            .map(|(i, pair)| TimeRange {
                start: pair[1],
                end: if i == 0 { pair[0] } else { pair[0] - TICK },
            })
            .collect()
    }
}

impl From<Vec<Timestamp>> for Endpoints {
    fn from(points: Vec<Timestamp>) -> Self {
        Self::from_unsorted(points)
    }
}
