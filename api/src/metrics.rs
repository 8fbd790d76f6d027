//! Prometheus counters for ingestion runs, served next to rocket's own metrics.

use rocket_prometheus::prometheus::{self, IntCounter, Registry};
use sheet_meat_common::IngestSummary;

pub struct IngestMetrics {
    runs: IntCounter,
    failed_runs: IntCounter,
    processed: IntCounter,
    finalized: IntCounter,
}

impl IngestMetrics {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let metrics = Self {
            runs: IntCounter::new("sheet_meat_ingest_runs_total", "Ingestion runs started")?,
            failed_runs: IntCounter::new(
                "sheet_meat_ingest_runs_failed_total",
                "Ingestion runs that ended in an error",
            )?,
            processed: IntCounter::new(
                "sheet_meat_ingest_games_processed_total",
                "Games fetched and written back",
            )?,
            finalized: IntCounter::new(
                "sheet_meat_ingest_games_finalized_total",
                "Games marked final",
            )?,
        };
        registry.register(Box::new(metrics.runs.clone()))?;
        registry.register(Box::new(metrics.failed_runs.clone()))?;
        registry.register(Box::new(metrics.processed.clone()))?;
        registry.register(Box::new(metrics.finalized.clone()))?;
        Ok(metrics)
    }

    pub fn record_success(&self, summary: &IngestSummary) {
        self.runs.inc();
        self.processed.inc_by(u64::from(summary.processed));
        self.finalized.inc_by(u64::from(summary.finalized));
    }

    pub fn record_failure(&self) {
        self.runs.inc();
        self.failed_runs.inc();
    }
}
