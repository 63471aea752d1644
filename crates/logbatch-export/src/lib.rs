//! logbatch export - write query results to object storage
//!
//! Tables are serialized as line-delimited JSON, one object per row with keys
//! in column order, and written to a local directory, an Azure storage
//! container or an in-memory store.
//!
//! Exporting is a side operation: [`Exporter::export_best_effort`] logs
//! failures instead of returning them so a failed upload never costs the
//! caller its in-memory result.

pub mod error;
pub mod exporter;
pub mod ndjson;
pub mod store;

pub use error::{ExportError, Result};
pub use exporter::{ExportSummary, Exporter};
pub use ndjson::{to_ndjson, write_ndjson};
pub use store::{build_store, StoreTarget};
