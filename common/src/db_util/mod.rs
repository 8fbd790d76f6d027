//! Interfaces between the application code and database.

use crate::ingest::{GameStore, WriteOutcome};
use crate::{GameRecord, GameUpdate};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use std::time::Duration;

mod conversions;
mod game;

pub use game::{get_candidate_games, update_game_results};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

const POOL_MAX_SIZE: u32 = 4;
const POOL_CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Build a connection pool. Connections are opened lazily on first use, so an
/// unreachable database shows up as a failed run rather than a failed start.
pub fn get_database_pool(database_url: &str) -> PgPool {
    get_database_pool_with_timeout(
        database_url,
        Duration::from_secs(POOL_CONNECTION_TIMEOUT_SECS),
    )
}

/// [`get_database_pool`] with a custom wait for a connection checkout.
pub fn get_database_pool_with_timeout(database_url: &str, connection_timeout: Duration) -> PgPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .connection_timeout(connection_timeout)
        .build_unchecked(manager)
}

/// Check out a connection from the pool.
///
/// # Errors
///
/// Returns an error if no connection could be established in time.
pub fn get_pooled_database_connection(pool: &PgPool) -> Result<PgPooledConnection> {
    pool.get()
        .context("Failed to get a database connection from the pool")
}

/// The `game` table as a [`GameStore`].
#[derive(Clone)]
pub struct PgGameStore {
    pool: PgPool,
}

impl PgGameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl GameStore for PgGameStore {
    fn candidate_games(&self, now: DateTime<Utc>) -> Result<Vec<GameRecord>> {
        let mut conn = get_pooled_database_connection(&self.pool)?;
        get_candidate_games(&mut conn, now)
    }

    fn apply_update(&self, game_id: u64, update: &GameUpdate) -> Result<WriteOutcome> {
        let mut conn = get_pooled_database_connection(&self.pool)?;
        update_game_results(&mut conn, game_id, update)
    }
}
