//! logbatch CLI
//!
//! Fetches the results of a logs query over a long window by splitting the
//! window into batches that each stay under the service's row and size caps.
//!
//! ## Usage
//!
//! ```bash
//! # Write a default logbatch.yml to edit
//! logbatch --generate-config
//!
//! # Show the batches a query would be split into
//! logbatch plan --workspace-id <id> -q "AppRequests" --lookback 7d
//!
//! # Row count and size diagnostic
//! logbatch estimate -q "AppRequests" --lookback 7d
//!
//! # Fetch everything and stream NDJSON to stdout
//! logbatch fetch -q "AppRequests" --lookback 7d --stdout > requests.jsonl
//!
//! # Fetch and export to the store configured in logbatch.yml
//! logbatch --config /etc/logbatch.yml fetch --export
//! ```

mod config;
mod progress;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use config::{AppConfig, LoggingSettings};
use logbatch_core::format_timestamp;
use logbatch_export::{build_store, write_ndjson, Exporter, StoreTarget};
use logbatch_query::{
    estimate_size, plan_batches, BatchFetcher, BatchLimits, BatchQuery, LogsQueryClient, QueryService,
};
use progress::ProgressObserver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logbatch")]
#[command(author, version, about = "Fetch large logs-query results in size-capped batches")]
struct Cli {
    /// Path to logbatch.yml config file
    #[arg(short, long, global = true, default_value = "logbatch.yml")]
    config: PathBuf,

    /// Write the default configuration to the --config path and exit
    #[arg(long)]
    generate_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan batches, fetch them concurrently and optionally export the result
    Fetch {
        #[command(flatten)]
        query: QueryArgs,

        /// Maximum number of batch queries in flight
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Run the size estimate before fetching
        #[arg(long)]
        estimate: bool,

        /// Write the combined result to stdout as NDJSON
        #[arg(long)]
        stdout: bool,

        /// Export the result even if export is disabled in the config
        #[arg(long, conflicts_with = "no_export")]
        export: bool,

        /// Skip the export even if it is enabled in the config
        #[arg(long)]
        no_export: bool,

        /// Export to this local directory instead of the configured target
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the batch ranges a query would be split into
    Plan {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print the row count and estimated size of the query window
    Estimate {
        #[command(flatten)]
        query: QueryArgs,
    },
}

/// Overrides for the service and query sections of the config
#[derive(Args)]
struct QueryArgs {
    /// Workspace to query
    #[arg(long, env = "LOGBATCH_WORKSPACE_ID")]
    workspace_id: Option<String>,

    /// Bearer token for the query API
    #[arg(long, env = "LOGBATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Base URL of the query API
    #[arg(long)]
    endpoint: Option<String>,

    /// Query text
    #[arg(short, long, conflicts_with = "query_file")]
    query: Option<String>,

    /// Read the query text from a file
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Timestamp column of the queried table
    #[arg(long)]
    time_column: Option<String>,

    /// End of the window (RFC 3339, default: now)
    #[arg(long)]
    end_time: Option<String>,

    /// Window length, e.g. 6h, 1d, 2w
    #[arg(short, long)]
    lookback: Option<String>,
}

impl QueryArgs {
    fn apply(self, config: &mut AppConfig) -> Result<()> {
        if let Some(workspace_id) = self.workspace_id {
            config.service.workspace_id = workspace_id;
        }
        if let Some(token) = self.token {
            config.service.token = Some(token);
        }
        if let Some(endpoint) = self.endpoint {
            config.service.endpoint = endpoint;
        }
        if let Some(query) = self.query {
            config.query.text = query;
        }
        if let Some(path) = self.query_file {
            config.query.text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read query file {}", path.display()))?;
        }
        if let Some(column) = self.time_column {
            config.query.time_column = column;
        }
        if let Some(end_time) = self.end_time {
            config.query.end_time = Some(end_time);
        }
        if let Some(lookback) = self.lookback {
            config.query.lookback = lookback;
        }
        Ok(())
    }
}

/// Resolved inputs shared by every subcommand
struct Session {
    client: Arc<LogsQueryClient>,
    request: BatchQuery,
    limits: BatchLimits,
}

impl Session {
    fn open(config: &AppConfig) -> Result<Self> {
        let request = config.batch_query(Utc::now())?;
        let limits = config.batch_limits()?;
        let client = LogsQueryClient::new(config.client_config()).context("Failed to create query client")?;

        info!(
            "Workspace {}: window {} (limits: {} rows, {} bytes)",
            request.workspace_id,
            request.window()?,
            limits.max_rows,
            limits.max_bytes
        );

        Ok(Self {
            client: Arc::new(client),
            request,
            limits,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        AppConfig::write_default(&cli.config)?;
        println!("Generated default configuration: {}", cli.config.display());
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("No command given (try --help)");
    };

    let mut config = AppConfig::load(&cli.config)?;
    init_logging(&config.logging);

    match command {
        Commands::Fetch {
            query,
            max_concurrency,
            estimate,
            stdout,
            export,
            no_export,
            output_dir,
        } => {
            query.apply(&mut config)?;
            if let Some(n) = max_concurrency {
                config.fetch.max_concurrency = n;
            }
            if estimate {
                config.fetch.estimate_first = true;
            }
            if let Some(root) = output_dir {
                config.export.target = StoreTarget::Local { root };
                config.export.enabled = true;
            }
            if export {
                config.export.enabled = true;
            }
            if no_export {
                config.export.enabled = false;
            }
            run_fetch(&config, stdout).await
        }
        Commands::Plan { query } => {
            query.apply(&mut config)?;
            run_plan(&config).await
        }
        Commands::Estimate { query } => {
            query.apply(&mut config)?;
            run_estimate(&config).await
        }
    }
}

/// `RUST_LOG` wins over the configured level; logs go to stderr so stdout
/// stays free for data
fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(settings.show_target)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_fetch(config: &AppConfig, to_stdout: bool) -> Result<()> {
    let start = Instant::now();
    let session = Session::open(config)?;

    if config.fetch.estimate_first {
        // Diagnostic only; a failed estimate never stops the fetch
        match estimate_size(session.client.as_ref(), &session.request).await {
            Ok(estimate) => {
                let (by_rows, by_bytes) = estimate.min_batches(&session.limits);
                info!(
                    "Estimated {} rows, {} bytes (at least {} batches)",
                    estimate.row_count,
                    estimate.total_size_bytes,
                    by_rows.max(by_bytes)
                );
            }
            Err(e) => warn!("Size estimate failed: {}", e),
        }
    }

    let endpoints = plan_batches(session.client.as_ref(), &session.request, &session.limits)
        .await
        .context("Batch planning failed")?;

    let progress = Arc::new(ProgressObserver::new(endpoints.batch_count()));
    let service: Arc<dyn QueryService> = session.client.clone();
    let fetcher = BatchFetcher::new(service, config.fetch.max_concurrency).with_observer(progress.clone());
    let run = fetcher.fetch(&session.request, &endpoints).await;
    progress.finish(&run);

    if !run.is_complete() {
        warn!(
            "{} of {} batches failed and {} returned partial results; the result is incomplete",
            run.failed(),
            run.batches.len(),
            run.partial()
        );
    }

    if to_stdout {
        let stdout = std::io::stdout();
        write_ndjson(&run.table, stdout.lock()).context("Failed to write results to stdout")?;
    }

    if config.export.enabled {
        match build_store(&config.export.target) {
            Ok(store) => {
                let exporter = Exporter::new(store, config.export.directory.as_str());
                if let Some(summary) = exporter.export_best_effort(&run.table, &config.export.file_name).await {
                    eprintln!("Exported {} rows to {}", summary.rows, summary.location);
                }
            }
            Err(e) => error!("Export skipped, store unavailable: {}", e),
        }
    }

    eprintln!();
    eprintln!("Fetch complete:");
    eprintln!("  Batches:  {}", run.batches.len());
    eprintln!("  Success:  {}", run.succeeded());
    eprintln!("  Partial:  {}", run.partial());
    eprintln!("  Failed:   {}", run.failed());
    eprintln!("  Rows:     {}", run.total_rows());
    eprintln!("  Duration: {:?}", start.elapsed());

    Ok(())
}

async fn run_plan(config: &AppConfig) -> Result<()> {
    let session = Session::open(config)?;
    let endpoints = plan_batches(session.client.as_ref(), &session.request, &session.limits)
        .await
        .context("Batch planning failed")?;

    println!("Endpoints ({}):", endpoints.len());
    for point in endpoints.as_slice() {
        println!("  {}", format_timestamp(*point));
    }

    let ranges = endpoints.ranges();
    println!("Batches ({}):", ranges.len());
    for (i, range) in ranges.iter().enumerate() {
        println!("  {:>4}  {}", i + 1, range.to_timespan());
    }
    Ok(())
}

async fn run_estimate(config: &AppConfig) -> Result<()> {
    let session = Session::open(config)?;
    let estimate = estimate_size(session.client.as_ref(), &session.request)
        .await
        .context("Size estimate failed")?;
    let (by_rows, by_bytes) = estimate.min_batches(&session.limits);

    println!("Rows:              {}", estimate.row_count);
    println!("Estimated bytes:   {}", estimate.total_size_bytes);
    println!("Min batches (rows):  {}", by_rows);
    println!("Min batches (bytes): {}", by_bytes);
    Ok(())
}
