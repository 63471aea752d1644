//! YAML configuration for the `logbatch` binary.
//!
//! Every section falls back to its defaults, so a config file only needs the
//! values that differ. Command line flags and environment variables override
//! whatever the file says.

use anyhow::{bail, Context, Result};
use logbatch_core::{parse_duration, parse_timestamp, Timestamp};
use logbatch_export::StoreTarget;
use logbatch_query::client::DEFAULT_ENDPOINT;
use logbatch_query::planner::{
    DEFAULT_BYTE_SAFETY, DEFAULT_ROW_SAFETY, DEFAULT_TIME_COLUMN, SERVICE_MAX_BYTES, SERVICE_MAX_ROWS,
};
use logbatch_query::{BatchLimits, BatchQuery, ClientConfig, DEFAULT_MAX_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration, loadable from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Query service connection
    pub service: ServiceSettings,
    /// What to query and over which window
    pub query: QuerySettings,
    /// Service limits used for batch planning
    pub limits: LimitSettings,
    /// Fetch behaviour
    pub fetch: FetchSettings,
    /// Export destination
    pub export: ExportSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Query service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Base URL of the query API
    pub endpoint: String,
    /// Workspace to query
    pub workspace_id: String,
    /// Bearer token; usually supplied through LOGBATCH_TOKEN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Client-side request timeout in seconds
    pub request_timeout_secs: u64,
    /// Server-side execution timeout in seconds
    pub server_timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            workspace_id: String::new(),
            token: None,
            request_timeout_secs: 660,
            server_timeout_secs: 600,
        }
    }
}

/// Query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Base query text
    pub text: String,
    /// Timestamp column of the queried table
    pub time_column: String,
    /// End of the window (RFC 3339); now when unset
    pub end_time: Option<String>,
    /// Window length, e.g. "6h", "1d", "2w"
    pub lookback: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            text: String::new(),
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            end_time: None,
            lookback: "1d".to_string(),
        }
    }
}

/// Service limits and the share of each used when planning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_rows: u64,
    pub row_safety_factor: f64,
    pub max_bytes: u64,
    pub byte_safety_factor: f64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_rows: SERVICE_MAX_ROWS,
            row_safety_factor: DEFAULT_ROW_SAFETY,
            max_bytes: SERVICE_MAX_BYTES,
            byte_safety_factor: DEFAULT_BYTE_SAFETY,
        }
    }
}

/// Fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Maximum number of batch queries in flight
    pub max_concurrency: usize,
    /// Run the size estimate before fetching
    pub estimate_first: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            estimate_first: false,
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Export the fetched table after a run
    pub enabled: bool,
    /// Store to write to
    pub target: StoreTarget,
    /// Directory inside the store
    pub directory: String,
    /// File name of the NDJSON output
    pub file_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            target: StoreTarget::default(),
            directory: "logbatch".to_string(),
            file_name: "results.jsonl".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Include target in logs
    pub show_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: false,
        }
    }
}

impl AppConfig {
    /// Load from a YAML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Write the default config to a file
    pub fn write_default(path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Resolve the batch query, using `now` when no end time is configured
    pub fn batch_query(&self, now: Timestamp) -> Result<BatchQuery> {
        if self.service.workspace_id.trim().is_empty() {
            bail!("workspace_id is not set (config service.workspace_id, --workspace-id or LOGBATCH_WORKSPACE_ID)");
        }
        if self.query.text.trim().is_empty() {
            bail!("query text is not set (config query.text, --query or --query-file)");
        }
        if self.query.time_column.trim().is_empty() {
            bail!("query.time_column must not be empty");
        }

        let end = match &self.query.end_time {
            Some(s) if !s.trim().is_empty() => parse_timestamp(s)?,
            _ => now,
        };
        let lookback = parse_duration(&self.query.lookback)?;
        if lookback.is_zero() {
            bail!("query.lookback must be positive");
        }

        Ok(BatchQuery::new(
            self.service.workspace_id.trim(),
            self.query.text.trim(),
            end,
            lookback,
        )
        .with_time_column(self.query.time_column.trim()))
    }

    pub fn batch_limits(&self) -> Result<BatchLimits> {
        Ok(BatchLimits::with_safety(
            self.limits.max_rows,
            self.limits.row_safety_factor,
            self.limits.max_bytes,
            self.limits.byte_safety_factor,
        )?)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.service.endpoint.clone(),
            token: self.service.token.clone(),
            request_timeout: Duration::from_secs(self.service.request_timeout_secs),
            server_timeout: Duration::from_secs(self.service.server_timeout_secs),
        }
    }
}
