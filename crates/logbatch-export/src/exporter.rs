//! Upload of result tables to an object store

use crate::error::Result;
use crate::ndjson::to_ndjson;
use logbatch_core::Table;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Object path the table was written to
    pub location: String,
    pub rows: usize,
    pub bytes: usize,
}

/// Writes tables as NDJSON files under one directory of a store.
///
/// Writing the same file twice overwrites it.
pub struct Exporter {
    store: Arc<dyn ObjectStore>,
    directory: String,
}

impl Exporter {
    pub fn new(store: Arc<dyn ObjectStore>, directory: impl Into<String>) -> Self {
        Self {
            store,
            directory: directory.into(),
        }
    }

    /// Object path of `file_name` inside the export directory
    pub fn location(&self, file_name: &str) -> Result<Path> {
        let directory = self.directory.trim_matches('/');
        let file_name = file_name.trim_matches('/');
        let full = if directory.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", directory, file_name)
        };
        Ok(Path::parse(full)?)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Serialize `table` and write it to `<directory>/<file_name>`
    pub async fn export(&self, table: &Table, file_name: &str) -> Result<ExportSummary> {
        let start = Instant::now();
        let location = self.location(file_name)?;
        let body = to_ndjson(table)?;
        let bytes = body.len();

        self.store.put(&location, PutPayload::from(body)).await?;

        info!(
            "Exported {} rows ({} bytes) to {} in {:?}",
            table.num_rows(),
            bytes,
            location,
            start.elapsed()
        );

        Ok(ExportSummary {
            location: location.to_string(),
            rows: table.num_rows(),
            bytes,
        })
    }

    /// Like [`Exporter::export`], but failures are logged and swallowed
    pub async fn export_best_effort(&self, table: &Table, file_name: &str) -> Option<ExportSummary> {
        match self.export(table, file_name).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("Export of {} failed: {}", file_name, e);
                None
            }
        }
    }
}
