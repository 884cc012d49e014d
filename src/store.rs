use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use crate::model::{GameIndexedRow, ImputeMethod, PlayerSeasonSummary};
use crate::pipeline::PipelineOutput;

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub source: String,
    pub game_rows: usize,
    pub players: usize,
    pub games_played: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Only the run log is created here; the two output tables are recreated by
/// every [`replace_tables`].
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            source TEXT NOT NULL,
            game_rows INTEGER NOT NULL,
            players INTEGER NOT NULL,
            games_played INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

const CREATE_OUTPUT_TABLES: &str = r#"
    DROP TABLE IF EXISTS game_indexed;
    DROP TABLE IF EXISTS player_summary;
    CREATE TABLE game_indexed (
        last TEXT NOT NULL,
        first TEXT NOT NULL,
        team TEXT NULL,
        team_pts REAL NULL,
        goals REAL NULL,
        total REAL NULL,
        game_index INTEGER NOT NULL,
        is_imputed INTEGER NOT NULL,
        impute_method TEXT NOT NULL,
        player TEXT NOT NULL,
        rank_in_game INTEGER NULL,
        cumulative_goals REAL NULL,
        cumulative_score REAL NULL,
        cumulative_rank INTEGER NULL,
        cumulative_percentile REAL NULL,
        cumulative_goals_percentile REAL NULL
    );
    CREATE INDEX idx_game_indexed_player ON game_indexed(player);
    CREATE INDEX idx_game_indexed_game ON game_indexed(game_index);
    CREATE TABLE player_summary (
        player TEXT PRIMARY KEY,
        total_goals REAL NOT NULL,
        overall_score REAL NOT NULL,
        avg_score_per_game REAL NULL,
        games_played_total INTEGER NOT NULL,
        games_played_actual INTEGER NOT NULL,
        max_total REAL NULL,
        min_total REAL NULL,
        avg_goals_per_game REAL NULL
    );
"#;

/// Drop, recreate and fill `game_indexed` and `player_summary`, then log the
/// run. All in one transaction: on error the previous tables survive.
pub fn replace_tables(
    conn: &mut Connection,
    output: &PipelineOutput,
    source: &str,
) -> Result<RunRecord> {
    replace_tables_then(conn, output, source, || Ok(())).map(|(run, ())| run)
}

/// Like [`replace_tables`], running `finish` after the rows are written but
/// before the transaction commits. An error from `finish` rolls the tables
/// back.
pub fn replace_tables_then<T>(
    conn: &mut Connection,
    output: &PipelineOutput,
    source: &str,
    finish: impl FnOnce() -> Result<T>,
) -> Result<(RunRecord, T)> {
    let started_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin replace transaction")?;
    tx.execute_batch(CREATE_OUTPUT_TABLES)
        .context("recreate output tables")?;

    {
        let mut stmt = tx
            .prepare(
                r#"
                INSERT INTO game_indexed (
                    last, first, team, team_pts, goals, total, game_index,
                    is_imputed, impute_method, player, rank_in_game,
                    cumulative_goals, cumulative_score, cumulative_rank,
                    cumulative_percentile, cumulative_goals_percentile
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
            )
            .context("prepare game_indexed insert")?;
        for g in &output.games {
            stmt.execute(params![
                g.last,
                g.first,
                g.team,
                g.team_pts,
                g.goals,
                g.total,
                g.game_index as i64,
                bool_to_i64(g.is_imputed),
                g.impute_method.as_str(),
                g.player,
                g.rank_in_game.map(i64::from),
                g.cumulative_goals,
                g.cumulative_score,
                g.cumulative_rank.map(i64::from),
                g.cumulative_percentile,
                g.cumulative_goals_percentile,
            ])
            .with_context(|| format!("insert game row {} #{}", g.player, g.game_index))?;
        }
    }

    {
        let mut stmt = tx
            .prepare(
                r#"
                INSERT INTO player_summary (
                    player, total_goals, overall_score, avg_score_per_game,
                    games_played_total, games_played_actual, max_total, min_total,
                    avg_goals_per_game
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .context("prepare player_summary insert")?;
        for s in &output.summaries {
            stmt.execute(params![
                s.player,
                s.total_goals,
                s.overall_score,
                s.avg_score_per_game,
                s.games_played_total as i64,
                s.games_played_actual as i64,
                s.max_total,
                s.min_total,
                s.avg_goals_per_game,
            ])
            .with_context(|| format!("insert summary row {}", s.player))?;
        }
    }

    let finished_at = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO pipeline_runs(started_at, finished_at, source, game_rows, players, games_played)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            started_at,
            finished_at,
            source,
            output.games.len() as i64,
            output.players() as i64,
            output.games_played() as i64,
        ],
    )
    .context("insert pipeline run")?;
    let run_id = tx.last_insert_rowid();
    let finished = finish()?;
    tx.commit().context("commit replace transaction")?;

    let run = RunRecord {
        run_id,
        started_at,
        finished_at,
        source: source.to_string(),
        game_rows: output.games.len(),
        players: output.players(),
        games_played: output.games_played(),
    };
    Ok((run, finished))
}

pub fn load_game_indexed(conn: &Connection) -> Result<Vec<GameIndexedRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                last, first, team, team_pts, goals, total, game_index,
                is_imputed, impute_method, player, rank_in_game,
                cumulative_goals, cumulative_score, cumulative_rank,
                cumulative_percentile, cumulative_goals_percentile
            FROM game_indexed
            ORDER BY rowid ASC
            "#,
        )
        .context("prepare load game_indexed query")?;

    let rows = stmt
        .query_map([], decode_game_row)
        .context("query load game_indexed")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode game_indexed row")?);
    }
    Ok(out)
}

fn decode_game_row(row: &Row<'_>) -> rusqlite::Result<GameIndexedRow> {
    let method: String = row.get(8)?;
    let impute_method = ImputeMethod::parse(&method).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            Type::Text,
            format!("unknown impute_method {method:?}").into(),
        )
    })?;
    Ok(GameIndexedRow {
        last: row.get(0)?,
        first: row.get(1)?,
        team: row.get(2)?,
        team_pts: row.get(3)?,
        goals: row.get(4)?,
        total: row.get(5)?,
        game_index: row.get::<_, u32>(6)?,
        is_imputed: row.get::<_, i64>(7)? != 0,
        impute_method,
        player: row.get(9)?,
        rank_in_game: row.get::<_, Option<u32>>(10)?,
        cumulative_goals: row.get(11)?,
        cumulative_score: row.get(12)?,
        cumulative_rank: row.get::<_, Option<u32>>(13)?,
        cumulative_percentile: row.get(14)?,
        cumulative_goals_percentile: row.get(15)?,
    })
}

pub fn load_player_summary(conn: &Connection) -> Result<Vec<PlayerSeasonSummary>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                player, total_goals, overall_score, avg_score_per_game,
                games_played_total, games_played_actual, max_total, min_total,
                avg_goals_per_game
            FROM player_summary
            ORDER BY player ASC
            "#,
        )
        .context("prepare load player_summary query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(PlayerSeasonSummary {
                player: row.get(0)?,
                total_goals: row.get(1)?,
                overall_score: row.get(2)?,
                avg_score_per_game: row.get(3)?,
                games_played_total: row.get::<_, u32>(4)?,
                games_played_actual: row.get::<_, u32>(5)?,
                max_total: row.get(6)?,
                min_total: row.get(7)?,
                avg_goals_per_game: row.get(8)?,
            })
        })
        .context("query load player_summary")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player_summary row")?);
    }
    Ok(out)
}

pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT run_id, started_at, finished_at, source, game_rows, players, games_played
             FROM pipeline_runs ORDER BY run_id DESC LIMIT ?1",
        )
        .context("prepare recent runs query")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                source: row.get(3)?,
                game_rows: row.get::<_, i64>(4)? as usize,
                players: row.get::<_, i64>(5)? as usize,
                games_played: row.get::<_, i64>(6)? as usize,
            })
        })
        .context("query recent runs")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode run row")?);
    }
    Ok(out)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
