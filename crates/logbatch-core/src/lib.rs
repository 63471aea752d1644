//! logbatch core - shared types for batched logs-query retrieval
//!
//! This crate provides the data types used by the planner, fetcher and
//! exporter:
//! - `Timestamp`: UTC timestamps as understood by the logs-query service
//! - `TimeRange`: an inclusive `[start, end]` window sent as a query timespan
//! - `Endpoints`: descending batch boundaries that partition a window
//! - `Table`: a named result table (ordered columns plus JSON rows)

pub mod error;
pub mod table;
pub mod types;

pub use error::{CoreError, Result};
pub use table::{Column, Table};
pub use types::*;
