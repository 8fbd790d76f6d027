//! A library with shared types, storage and results ingestion for the sheet meat pick'em.

#[cfg(feature = "database")]
pub mod config;
#[cfg(feature = "database")]
pub mod db_util;
pub mod ingest;
#[cfg(feature = "network")]
pub mod provider;
pub mod summary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base URL of the public scores API. Summaries live under `{base}/summary`.
pub const DEFAULT_SCORES_API_BASE: &str =
    "https://site.api.espn.com/apis/site/v2/sports/football/nfl";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// A game row as far as results ingestion is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: u64,
    /// The provider's event id. Games without one cannot be looked up.
    pub espn_game_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub final_at: Option<DateTime<Utc>>,
    pub week_number: u32,
    pub home_team_id: Option<u64>,
    pub away_team_id: Option<u64>,
}

impl GameRecord {
    /// Kicked off before `now` and still waiting on a result.
    pub fn is_candidate(&self, now: DateTime<Utc>) -> bool {
        self.final_at.is_none() && self.starts_at < now
    }
}

/// Points at the final whistle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub home: u16,
    pub away: u16,
}

/// The one-way transition of a game to final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalization {
    pub score: FinalScore,
    pub final_at: DateTime<Utc>,
}

/// Everything a single provider fetch writes back to a game row.
/// The snapshot is always written, the finalization only once.
#[derive(Debug, Clone, PartialEq)]
pub struct GameUpdate {
    pub snapshot: Value,
    pub finalization: Option<Finalization>,
}

/// Counters for a single ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Games returned by the candidate query.
    pub candidates: usize,
    /// Games that were fetched and written back.
    pub processed: u32,
    /// Games that went final during this run.
    pub finalized: u32,
    pub skipped: u32,
}

/// Body returned to whatever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            processed: None,
            finalized: None,
            error: Some(message.into()),
        }
    }
}

impl From<&IngestSummary> for IngestResponse {
    fn from(summary: &IngestSummary) -> Self {
        // an empty slate only reports processed
        let finalized = if summary.candidates == 0 {
            None
        } else {
            Some(summary.finalized)
        };
        Self {
            ok: true,
            processed: Some(summary.processed),
            finalized,
            error: None,
        }
    }
}
