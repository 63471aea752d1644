//! Terminal progress for batch runs

use indicatif::{ProgressBar, ProgressStyle};
use logbatch_query::{BatchRun, BatchSummary, FetchObserver, QueryStatus};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Advances a progress bar as batches finish
pub struct ProgressObserver {
    bar: ProgressBar,
    rows: AtomicUsize,
}

impl ProgressObserver {
    pub fn new(batches: usize) -> Self {
        let bar = ProgressBar::new(batches as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} batches {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self::with_bar(bar)
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            rows: AtomicUsize::new(0),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn finish(&self, run: &BatchRun) {
        self.bar.finish_with_message(format!(
            "{} rows ({} ok, {} partial, {} failed)",
            self.rows(),
            run.succeeded(),
            run.partial(),
            run.failed()
        ));
    }
}

impl FetchObserver for ProgressObserver {
    fn on_batch_complete(&self, batch: &BatchSummary) {
        let rows = self.rows.fetch_add(batch.rows, Ordering::Relaxed) + batch.rows;
        match batch.status {
            QueryStatus::Success => {}
            QueryStatus::Partial => self.bar.println(format!(
                "batch {}/{} {} returned partial results",
                batch.index + 1,
                batch.total,
                batch.range
            )),
            QueryStatus::Failure => self.bar.println(format!(
                "batch {}/{} {} failed",
                batch.index + 1,
                batch.total,
                batch.range
            )),
        }
        self.bar.set_message(format!("{} rows", rows));
        self.bar.inc(1);
    }
}
