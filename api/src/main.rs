//! An http service that pulls final scores into the pick'em database.
//!
//! An external scheduler hits `GET /api/cron/ingest-results` every few
//! minutes; each hit is one ingestion run.

#[macro_use]
extern crate rocket;

mod helpers;
mod metrics;

use chrono::{DateTime, Utc};
use helpers::{CronAuth, RequestTimingFairing, ingest_failure};
use metrics::IngestMetrics;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use rocket_prometheus::PrometheusMetrics;
use sheet_meat_common::config::{IngestConfig, ProviderConfig};
use sheet_meat_common::db_util::{PgGameStore, PgPool, get_database_pool};
use sheet_meat_common::ingest::run_ingestion;
use sheet_meat_common::provider::EspnClient;
use sheet_meat_common::{IngestResponse, IngestSummary};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Runs one ingestion pass. Called from a blocking worker thread.
pub trait IngestBackend: Send + Sync {
    fn run(&self, now: DateTime<Utc>) -> anyhow::Result<IngestSummary>;
}

/// Games from Postgres, summaries from the scores API.
struct LiveBackend {
    pool: PgPool,
    provider: ProviderConfig,
}

impl IngestBackend for LiveBackend {
    fn run(&self, now: DateTime<Utc>) -> anyhow::Result<IngestSummary> {
        let store = PgGameStore::new(self.pool.clone());
        // the blocking client has to be created and dropped off the async runtime
        let source = EspnClient::new(&self.provider.api_base, self.provider.timeout)?;
        run_ingestion(&store, &source, now)
    }
}

/// Everything a trigger needs, built once at startup.
pub struct IngestContext {
    backend: Arc<dyn IngestBackend>,
    target_week: Option<u32>,
    cron_secret: Option<String>,
}

impl IngestContext {
    fn from_config(config: IngestConfig) -> Self {
        Self::live(get_database_pool(&config.database_url), config.provider)
            .with_target_week(config.target_week)
            .with_cron_secret(config.cron_secret)
    }

    fn live(pool: PgPool, provider: ProviderConfig) -> Self {
        Self::new(Arc::new(LiveBackend { pool, provider }))
    }

    fn new(backend: Arc<dyn IngestBackend>) -> Self {
        Self {
            backend,
            target_week: None,
            cron_secret: None,
        }
    }

    fn with_target_week(mut self, target_week: Option<u32>) -> Self {
        self.target_week = target_week;
        self
    }

    fn with_cron_secret(mut self, cron_secret: Option<String>) -> Self {
        self.cron_secret = cron_secret;
        self
    }
}

#[get("/ingest-results")]
async fn ingest_results(
    _auth: CronAuth,
    context: &State<IngestContext>,
    metrics: &State<IngestMetrics>,
) -> (Status, Json<IngestResponse>) {
    if let Some(week) = context.target_week {
        tracing::debug!(target_week = week, "Target week is set but not used to filter games");
    }

    // diesel and the blocking http client both block the worker
    let backend = Arc::clone(&context.backend);
    let joined = rocket::tokio::task::spawn_blocking(move || backend.run(Utc::now())).await;

    match joined {
        Ok(Ok(summary)) => {
            metrics.record_success(&summary);
            tracing::info!(
                candidates = summary.candidates,
                processed = summary.processed,
                finalized = summary.finalized,
                skipped = summary.skipped,
                "Ingestion run complete"
            );
            (Status::Ok, Json(IngestResponse::from(&summary)))
        }
        Ok(Err(e)) => {
            metrics.record_failure();
            let message = format!("{e:#}");
            tracing::error!(error = %message, "Ingestion run failed");
            ingest_failure(message)
        }
        Err(e) => {
            metrics.record_failure();
            tracing::error!(error = %e, "Ingestion task did not finish");
            ingest_failure(format!("Ingestion task did not finish: {e}"))
        }
    }
}

#[catch(401)]
fn unauthorized() -> Json<IngestResponse> {
    Json(IngestResponse::failure("Unauthorized"))
}

#[catch(404)]
fn not_found() -> Json<IngestResponse> {
    Json(IngestResponse::failure(
        "The requested resource could not be found.",
    ))
}

#[catch(500)]
fn internal_error() -> Json<IngestResponse> {
    Json(IngestResponse::failure("Internal server error"))
}

fn build_rocket(context: IngestContext) -> anyhow::Result<Rocket<Build>> {
    let prometheus = PrometheusMetrics::new();
    let metrics = IngestMetrics::register(prometheus.registry())?;

    Ok(rocket::build()
        .attach(RequestTimingFairing)
        .attach(prometheus.clone())
        .manage(context)
        .manage(metrics)
        .mount("/api/cron", routes![ingest_results])
        .mount("/metrics", prometheus)
        .register("/", catchers![unauthorized, not_found, internal_error]))
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // no database url, no service
    let config = IngestConfig::from_env()?;
    tracing::info!(
        api_base = %config.provider.api_base,
        timeout_secs = config.provider.timeout.as_secs(),
        target_week = ?config.target_week,
        cron_secret = config.cron_secret.is_some(),
        "Starting results ingestion service"
    );

    build_rocket(IngestContext::from_config(config))?
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed to launch: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rocket::http::Header;
    use rocket::local::blocking::Client;
    use rocket::serde::json::{Value, json};
    use sheet_meat_common::GameRecord;
    use sheet_meat_common::db_util::get_database_pool_with_timeout;
    use sheet_meat_common::ingest::{GameStore, SummarySource, WriteOutcome};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Games and summaries held in memory.
    #[derive(Default)]
    struct MemoryBackend {
        games: Mutex<Vec<GameRecord>>,
        summaries: HashMap<String, Value>,
    }

    impl GameStore for MemoryBackend {
        fn candidate_games(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<GameRecord>> {
            let games = self.games.lock().unwrap();
            Ok(games.iter().filter(|g| g.is_candidate(now)).cloned().collect())
        }

        fn apply_update(
            &self,
            game_id: u64,
            update: &sheet_meat_common::GameUpdate,
        ) -> anyhow::Result<WriteOutcome> {
            let mut games = self.games.lock().unwrap();
            let Some(game) = games.iter_mut().find(|g| g.game_id == game_id) else {
                return Ok(WriteOutcome::Missing);
            };
            match update.finalization {
                Some(fin) if game.final_at.is_none() => {
                    game.final_at = Some(fin.final_at);
                    Ok(WriteOutcome::Finalized)
                }
                _ => Ok(WriteOutcome::Snapshot),
            }
        }
    }

    impl SummarySource for MemoryBackend {
        type Error = String;

        fn fetch_summary(&self, event_id: &str) -> Result<Value, String> {
            self.summaries
                .get(event_id)
                .cloned()
                .ok_or_else(|| format!("no summary for event {event_id}"))
        }
    }

    impl IngestBackend for MemoryBackend {
        fn run(&self, now: DateTime<Utc>) -> anyhow::Result<IngestSummary> {
            run_ingestion(self, self, now)
        }
    }

    fn summary_doc(completed: bool, home: &str, away: &str) -> Value {
        json!({
            "header": {
                "competitions": [{
                    "status": { "type": { "completed": completed } },
                    "competitors": [
                        { "homeAway": "home", "score": home },
                        { "homeAway": "away", "score": away },
                    ]
                }]
            }
        })
    }

    fn game(game_id: u64, event_id: &str, kickoff_hours_ago: i64) -> GameRecord {
        GameRecord {
            game_id,
            espn_game_id: Some(event_id.to_string()),
            starts_at: Utc::now() - TimeDelta::hours(kickoff_hours_ago),
            final_at: None,
            week_number: 9,
            home_team_id: None,
            away_team_id: None,
        }
    }

    fn week_nine() -> MemoryBackend {
        MemoryBackend {
            games: Mutex::new(vec![
                game(1, "401", 4),
                game(2, "402", 1),
                game(3, "403", -2),
            ]),
            summaries: HashMap::from([
                ("401".to_string(), summary_doc(true, "24", "17")),
                ("402".to_string(), summary_doc(false, "7", "3")),
                ("403".to_string(), summary_doc(true, "0", "0")),
            ]),
        }
    }

    fn client_with(backend: Arc<dyn IngestBackend>, cron_secret: Option<&str>) -> Client {
        let context = IngestContext::new(backend)
            .with_target_week(Some(9))
            .with_cron_secret(cron_secret.map(str::to_string));
        Client::tracked(build_rocket(context).unwrap()).expect("valid rocket instance")
    }

    /// Wired to a database nobody is listening on.
    fn client(cron_secret: Option<&str>) -> Client {
        let pool = get_database_pool_with_timeout(
            "postgres://nobody@127.0.0.1:1/sheet_meat",
            Duration::from_millis(250),
        );
        let context = IngestContext::live(pool, ProviderConfig::default())
            .with_target_week(Some(4))
            .with_cron_secret(cron_secret.map(str::to_string));
        Client::tracked(build_rocket(context).unwrap()).expect("valid rocket instance")
    }

    #[test]
    fn test_trigger_reports_counts() {
        let client = client_with(Arc::new(week_nine()), None);

        let response = client.get("/api/cron/ingest-results").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.into_json::<IngestResponse>().unwrap(),
            IngestResponse {
                ok: true,
                processed: Some(2),
                finalized: Some(1),
                error: None,
            }
        );

        // the final game drops out, the live one is fetched again
        let response = client.get("/api/cron/ingest-results").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_json::<IngestResponse>().unwrap();
        assert_eq!((body.processed, body.finalized), (Some(1), Some(0)));

        let metrics = client.get("/metrics").dispatch().into_string().unwrap();
        assert!(metrics.contains("sheet_meat_ingest_runs_total 2"));
        assert!(metrics.contains("sheet_meat_ingest_games_finalized_total 1"));
    }

    #[test]
    fn test_trigger_with_nothing_to_do() {
        let client = client_with(Arc::new(MemoryBackend::default()), Some("hunter2"));

        let response = client
            .get("/api/cron/ingest-results")
            .header(Header::new("Authorization", "Bearer hunter2"))
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().unwrap();
        assert_eq!(body, r#"{"ok":true,"processed":0}"#);
    }

    #[test]
    fn test_unreachable_database_is_500() {
        let client = client(None);

        let response = client.get("/api/cron/ingest-results").dispatch();

        assert_eq!(response.status(), Status::InternalServerError);
        let body = response.into_json::<IngestResponse>().unwrap();
        assert!(!body.ok);
        assert_eq!(body.processed, None);
        let error = body.error.unwrap();
        assert!(error.starts_with("Failed to query candidate games"), "{error}");

        let metrics = client.get("/metrics").dispatch().into_string().unwrap();
        assert!(metrics.contains("sheet_meat_ingest_runs_failed_total 1"));
    }

    #[test]
    fn test_trigger_without_secret_is_unauthorized() {
        let client = client(Some("hunter2"));
        let response = client.get("/api/cron/ingest-results").dispatch();

        assert_eq!(response.status(), Status::Unauthorized);
        let body = response.into_json::<IngestResponse>().unwrap();
        assert!(!body.ok);
        assert_eq!(body.error.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_trigger_with_wrong_secret_is_unauthorized() {
        let client = client(Some("hunter2"));
        let response = client
            .get("/api/cron/ingest-results")
            .header(Header::new("Authorization", "Bearer hunter3"))
            .dispatch();

        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[test]
    fn test_unknown_route_is_json_404() {
        let client = client(None);
        let response = client.get("/api/cron/ingest-everything").dispatch();

        assert_eq!(response.status(), Status::NotFound);
        let body = response.into_json::<IngestResponse>().unwrap();
        assert!(!body.ok);
        assert!(body.error.is_some());
    }

    #[test]
    fn test_post_is_not_a_trigger() {
        let client = client(None);
        let response = client.post("/api/cron/ingest-results").dispatch();

        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn test_metrics_are_exposed() {
        let client = client(None);
        let response = client.get("/metrics").dispatch();

        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().unwrap();
        assert!(body.contains("sheet_meat_ingest_runs_total"));
        assert!(body.contains("sheet_meat_ingest_games_finalized_total"));
    }
}
