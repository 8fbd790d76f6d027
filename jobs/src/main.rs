//! Scheduled jobs for the sheet meat pick'em.
//!
//! Runs one results ingestion pass and prints the outcome as JSON, for hosts
//! that schedule with cron or systemd timers instead of the HTTP trigger.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use sheet_meat_common::config::{IngestConfig, ProviderConfig, load_dotenv};
use sheet_meat_common::db_util::{PgGameStore, get_database_pool};
use sheet_meat_common::ingest::run_ingestion;
use sheet_meat_common::provider::EspnClient;
use sheet_meat_common::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCORES_API_BASE, IngestResponse};
use std::process::ExitCode;
use std::time::Duration;

/// Pull final scores for games that have kicked off but are not final yet.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Base URL of the scores API
    #[arg(long, env = "SCORES_API_BASE", default_value = DEFAULT_SCORES_API_BASE)]
    api_base: String,

    /// Per-request timeout for the scores API, in seconds
    #[arg(long, env = "SCORES_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Week being played; logged only
    #[arg(long, env = "TARGET_WEEK_NUMBER")]
    target_week: Option<u32>,

    /// Log every skipped game
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for IngestConfig {
    fn from(cli: Cli) -> Self {
        IngestConfig {
            database_url: cli.database_url,
            provider: ProviderConfig {
                api_base: cli.api_base,
                timeout: Duration::from_secs(cli.timeout_secs),
            },
            target_week: cli.target_week,
            cron_secret: None,
        }
    }
}

fn run(config: &IngestConfig) -> Result<IngestResponse> {
    let store = PgGameStore::new(get_database_pool(&config.database_url));
    let source = EspnClient::new(&config.provider.api_base, config.provider.timeout)
        .context("Failed to build HTTP client")?;
    let summary = run_ingestion(&store, &source, chrono::Utc::now())?;
    Ok(IngestResponse::from(&summary))
}

fn main() -> ExitCode {
    load_dotenv();
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = IngestConfig::from(cli);
    info!("Results ingestion started against {}", config.provider.api_base);
    if let Some(week) = config.target_week {
        info!("Target week {week} (not used to filter games)");
    }

    let (response, code) = match run(&config) {
        Ok(response) => (response, ExitCode::SUCCESS),
        Err(e) => {
            error!("Results ingestion failed: {e:#}");
            (IngestResponse::failure(format!("{e:#}")), ExitCode::FAILURE)
        }
    };
    match serde_json::to_string(&response) {
        Ok(body) => println!("{body}"),
        Err(e) => error!("Could not serialize the run summary: {e}"),
    }
    code
}
