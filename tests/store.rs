use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;

use gng_terminal::config::PipelineConfig;
use gng_terminal::pipeline::{self, PipelineOutput};
use gng_terminal::sheet::WideTable;
use gng_terminal::store::{
    init_schema, load_game_indexed, load_player_summary, recent_runs, replace_tables,
    replace_tables_then,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_output() -> PipelineOutput {
    let raw = read_fixture("season_small.csv");
    let table = WideTable::from_reader(raw.as_bytes(), 2).expect("fixture should parse");
    let cfg = PipelineConfig {
        header_row: 2,
        ..PipelineConfig::default()
    };
    pipeline::run(&table, &cfg).expect("pipeline should succeed")
}

fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory sqlite");
    init_schema(&conn).expect("schema");
    conn
}

#[test]
fn tables_round_trip() {
    let output = fixture_output();
    let mut conn = memory_db();
    let run = replace_tables(&mut conn, &output, "season_small.csv").unwrap();
    assert_eq!(run.game_rows, 12);
    assert_eq!(run.players, 4);
    assert_eq!(run.games_played, 3);

    let games = load_game_indexed(&conn).unwrap();
    assert_eq!(games, output.games);

    let summaries = load_player_summary(&conn).unwrap();
    assert_eq!(summaries, output.summaries);
}

#[test]
fn second_run_replaces_instead_of_appending() {
    let output = fixture_output();
    let mut conn = memory_db();
    replace_tables(&mut conn, &output, "first").unwrap();

    let mut smaller = output.clone();
    smaller.games.retain(|g| g.game_index == 1);
    smaller.summaries.truncate(2);
    replace_tables(&mut conn, &smaller, "second").unwrap();

    assert_eq!(load_game_indexed(&conn).unwrap().len(), 4);
    assert_eq!(load_player_summary(&conn).unwrap().len(), 2);

    let runs = recent_runs(&conn, 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].source, "second");
    assert_eq!(runs[1].source, "first");
}

#[test]
fn failed_replace_keeps_previous_tables() {
    let output = fixture_output();
    let mut conn = memory_db();
    replace_tables(&mut conn, &output, "good").unwrap();

    let mut broken = output.clone();
    let dup = broken.summaries[0].clone();
    broken.summaries.push(dup);
    assert!(replace_tables(&mut conn, &broken, "bad").is_err());

    assert_eq!(load_game_indexed(&conn).unwrap().len(), output.games.len());
    assert_eq!(load_player_summary(&conn).unwrap().len(), output.summaries.len());
    assert_eq!(recent_runs(&conn, 10).unwrap().len(), 1);
}

#[test]
fn failing_finish_rolls_back_the_replace() {
    let output = fixture_output();
    let mut conn = memory_db();
    replace_tables(&mut conn, &output, "good").unwrap();

    let mut smaller = output.clone();
    smaller.games.truncate(1);
    let res = replace_tables_then(&mut conn, &smaller, "late failure", || {
        Err::<(), _>(anyhow::anyhow!("export could not be moved into place"))
    });
    assert!(res.is_err());
    assert_eq!(load_game_indexed(&conn).unwrap().len(), output.games.len());
    assert_eq!(recent_runs(&conn, 10).unwrap().len(), 1);

    let (run, value) = replace_tables_then(&mut conn, &smaller, "ok", || Ok(7)).unwrap();
    assert_eq!((run.source.as_str(), value), ("ok", 7));
    assert_eq!(load_game_indexed(&conn).unwrap().len(), 1);
}
