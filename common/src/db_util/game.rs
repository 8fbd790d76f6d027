use super::*;
use crate::Finalization;
use diesel::pg::Pg;
use diesel::query_builder::QueryFragment;
use diesel::query_dsl::methods::ExecuteDsl;
use log::warn;

table! {
    game (id) {
        id -> BigInt,
        espn_game_id -> Nullable<Text>,
        starts_at -> Timestamptz,
        final_at -> Nullable<Timestamptz>,
        week_number -> Integer,
        home_team_id -> Nullable<BigInt>,
        away_team_id -> Nullable<BigInt>,
        final_home_score -> Nullable<Integer>,
        final_away_score -> Nullable<Integer>,
        results_snapshot -> Nullable<Jsonb>,
    }
}

/// The columns ingestion reads. Scores and snapshot are write-only here.
#[derive(Queryable)]
#[diesel(table_name = game)]
struct GamePrivate {
    id: i64,
    espn_game_id: Option<String>,
    starts_at: DateTime<Utc>,
    final_at: Option<DateTime<Utc>>,
    week_number: i32,
    home_team_id: Option<i64>,
    away_team_id: Option<i64>,
}

fn private_to_public(p: GamePrivate) -> Result<GameRecord> {
    use conversions::*;
    Ok(GameRecord {
        game_id: i64_to_u64(p.id)?,
        espn_game_id: p.espn_game_id,
        starts_at: p.starts_at,
        final_at: p.final_at,
        week_number: i32_to_u32(p.week_number)?,
        home_team_id: opti64_to_optu64(p.home_team_id)?,
        away_team_id: opti64_to_optu64(p.away_team_id)?,
    })
}

/// Games that kicked off before `now` and have no result yet, earliest first.
///
/// # Errors
///
/// Returns an error if the query fails or a row holds out-of-range ids.
pub fn get_candidate_games(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<Vec<GameRecord>> {
    use self::game::dsl::*;

    let rows: Vec<GamePrivate> = game
        .filter(final_at.is_null())
        .filter(starts_at.lt(now))
        .order(starts_at.asc())
        .select((
            id,
            espn_game_id,
            starts_at,
            final_at,
            week_number,
            home_team_id,
            away_team_id,
        ))
        .load(conn)
        .context("Failed to load candidate games")?;

    rows.into_iter().map(private_to_public).collect()
}

/// The finalization write. Only matches a row whose `final_at` is still null.
fn finalize_statement(
    row_id: i64,
    fin: Finalization,
) -> impl RunQueryDsl<PgConnection> + ExecuteDsl<PgConnection> + QueryFragment<Pg> {
    use self::game::dsl::*;

    diesel::update(game.filter(id.eq(row_id)).filter(final_at.is_null())).set((
        final_home_score.eq(Some(conversions::u16_to_i32(fin.score.home))),
        final_away_score.eq(Some(conversions::u16_to_i32(fin.score.away))),
        final_at.eq(Some(fin.final_at)),
    ))
}

/// Write a provider fetch back to one game.
///
/// The snapshot is replaced unconditionally. Scores and `final_at` are only
/// written while `final_at` is still null, so a final game stays as it was.
/// A row deleted since the candidate query comes back as
/// [`WriteOutcome::Missing`].
///
/// # Errors
///
/// Returns an error if either statement fails; nothing from this call is kept.
pub fn update_game_results(
    conn: &mut PgConnection,
    row_id: u64,
    update: &GameUpdate,
) -> Result<WriteOutcome> {
    use self::game::dsl::*;

    let row_id = conversions::u64_to_i64(row_id)?;

    conn.transaction::<_, anyhow::Error, _>(|conn| {
        let written = diesel::update(game.filter(id.eq(row_id)))
            .set(results_snapshot.eq(Some(update.snapshot.clone())))
            .execute(conn)
            .context("Failed to write results snapshot")?;
        if written == 0 {
            warn!("Game #{row_id} no longer exists, nothing written");
            return Ok(WriteOutcome::Missing);
        }

        let Some(fin) = update.finalization else {
            return Ok(WriteOutcome::Snapshot);
        };
        let finalized = finalize_statement(row_id, fin)
            .execute(conn)
            .context("Failed to write final score")?;
        Ok(if finalized > 0 {
            WriteOutcome::Finalized
        } else {
            WriteOutcome::Snapshot
        })
    })
}
