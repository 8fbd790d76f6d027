//! One pass of results ingestion.
//!
//! Candidate games (kicked off, not final) are walked in kickoff order. Each
//! one is fetched from the provider, its snapshot is written back, and if the
//! provider reports a completed game with both scores the row goes final.
//! Per-game provider trouble is a skip; a failed write stops the run.

use crate::summary::{SummaryParse, parse_summary};
use crate::{Finalization, GameRecord, GameUpdate, IngestSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;

/// Where candidate games are read from and results written to.
pub trait GameStore {
    /// Games with no `final_at` whose kickoff is strictly before `now`,
    /// earliest kickoff first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn candidate_games(&self, now: DateTime<Utc>) -> Result<Vec<GameRecord>>;

    /// Write `update` to the game. The snapshot always lands; the
    /// finalization only lands on a row that is not final yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn apply_update(&self, game_id: u64, update: &GameUpdate) -> Result<WriteOutcome>;
}

/// What a single [`GameStore::apply_update`] did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row is gone; nothing was written.
    Missing,
    /// Only the snapshot changed.
    Snapshot,
    /// The snapshot changed and this write made the game final.
    Finalized,
}

/// Anything that can hand back the raw summary document for an event.
pub trait SummarySource {
    type Error: fmt::Display;

    /// Fetch the full summary document for a provider event id.
    ///
    /// # Errors
    ///
    /// Returns an error when the document could not be retrieved. The run
    /// treats this as a skip for the one game.
    fn fetch_summary(&self, event_id: &str) -> Result<Value, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingEventId,
    NotStarted,
    Fetch(String),
    RowMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEventId => write!(f, "no provider event id"),
            SkipReason::NotStarted => write!(f, "not started yet"),
            SkipReason::Fetch(msg) => write!(f, "fetch failed: {msg}"),
            SkipReason::RowMissing => write!(f, "row deleted before the write"),
        }
    }
}

/// What happened to a single candidate. A failure is the `Err` side of
/// [`process_game`] and ends the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    Updated { newly_finalized: bool },
    Skipped(SkipReason),
}

/// Turn a fetched summary into the write for `game`.
/// Games that already carry a `final_at` only get their snapshot refreshed.
pub fn build_update(game: &GameRecord, snapshot: Value, finalized_at: DateTime<Utc>) -> GameUpdate {
    let parsed = parse_summary(&snapshot);
    if let SummaryParse::Malformed(reason) = &parsed {
        debug!("Game #{}: summary not usable ({reason})", game.game_id);
    }

    let finalization = match (game.final_at, parsed.final_score()) {
        (None, Some(score)) => Some(Finalization {
            score,
            final_at: finalized_at,
        }),
        _ => None,
    };

    GameUpdate {
        snapshot,
        finalization,
    }
}

/// Fetch, parse and persist a single candidate game.
///
/// # Errors
///
/// Returns an error only when the store rejects the write. A row that
/// vanished since the candidate query is a skip, not an error.
pub fn process_game<S, P>(
    store: &S,
    source: &P,
    game: &GameRecord,
    now: DateTime<Utc>,
) -> Result<GameOutcome>
where
    S: GameStore + ?Sized,
    P: SummarySource + ?Sized,
{
    let Some(event_id) = game
        .espn_game_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
    else {
        return Ok(GameOutcome::Skipped(SkipReason::MissingEventId));
    };
    if game.starts_at >= now {
        return Ok(GameOutcome::Skipped(SkipReason::NotStarted));
    }

    let snapshot = match source.fetch_summary(event_id) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Game #{} (event {event_id}): {e}", game.game_id);
            return Ok(GameOutcome::Skipped(SkipReason::Fetch(e.to_string())));
        }
    };

    let update = build_update(game, snapshot, Utc::now());
    let written = store
        .apply_update(game.game_id, &update)
        .with_context(|| format!("Failed to update game #{}", game.game_id))?;

    Ok(match written {
        WriteOutcome::Missing => GameOutcome::Skipped(SkipReason::RowMissing),
        WriteOutcome::Snapshot => GameOutcome::Updated { newly_finalized: false },
        WriteOutcome::Finalized => GameOutcome::Updated { newly_finalized: true },
    })
}

/// Run one ingestion pass over every candidate game.
///
/// Games are handled one at a time in kickoff order. Writes made before a
/// failure stay committed.
///
/// # Errors
///
/// Returns an error if the candidate query fails or any write fails.
pub fn run_ingestion<S, P>(store: &S, source: &P, now: DateTime<Utc>) -> Result<IngestSummary>
where
    S: GameStore + ?Sized,
    P: SummarySource + ?Sized,
{
    let games = store
        .candidate_games(now)
        .context("Failed to query candidate games")?;

    let mut summary = IngestSummary {
        candidates: games.len(),
        ..IngestSummary::default()
    };
    if games.is_empty() {
        debug!("No games waiting on a result");
        return Ok(summary);
    }
    info!("Checking {} games waiting on a result", games.len());

    for game in &games {
        match process_game(store, source, game, now)? {
            GameOutcome::Updated { newly_finalized } => {
                summary.processed += 1;
                if newly_finalized {
                    summary.finalized += 1;
                    info!("Game #{} (week {}) is final", game.game_id, game.week_number);
                }
            }
            GameOutcome::Skipped(reason) => {
                summary.skipped += 1;
                debug!("Game #{} skipped: {reason}", game.game_id);
            }
        }
    }

    info!(
        "Ingestion complete: {} processed, {} finalized, {} skipped",
        summary.processed, summary.finalized, summary.skipped
    );
    Ok(summary)
}
