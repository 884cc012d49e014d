use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use gng_terminal::config::PipelineConfig;
use gng_terminal::export::{StagedExport, export_csv, export_workbook};
use gng_terminal::model::{
    GAME_INDEXED_COLUMNS, GameIndexedRow, PLAYER_SUMMARY_COLUMNS, PlayerSeasonSummary,
};
use gng_terminal::pipeline::{self, PipelineOutput};
use gng_terminal::sheet::WideTable;

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

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("gng_export_{tag}_{}_{nanos}", std::process::id()))
}

fn header_of(path: &PathBuf) -> Vec<String> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.headers().unwrap().iter().map(|h| h.to_string()).collect()
}

#[test]
fn csv_export_round_trips_both_tables() {
    let output = fixture_output();
    let dir = scratch_dir("csv");
    let report = export_csv(&dir, &output, "20250101").unwrap();

    assert!(report.game_indexed_path.ends_with("game_indexed_20250101.csv"));
    assert!(report.player_summary_path.ends_with("player_summary_20250101.csv"));
    assert_eq!(report.game_rows, 12);
    assert_eq!(report.summary_rows, 4);

    assert_eq!(header_of(&report.game_indexed_path), GAME_INDEXED_COLUMNS);
    assert_eq!(header_of(&report.player_summary_path), PLAYER_SUMMARY_COLUMNS);

    let games: Vec<GameIndexedRow> = csv::Reader::from_path(&report.game_indexed_path)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(games, output.games);

    let summaries: Vec<PlayerSeasonSummary> = csv::Reader::from_path(&report.player_summary_path)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(summaries, output.summaries);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn empty_tables_still_get_headers() {
    let output = PipelineOutput {
        games: Vec::new(),
        summaries: Vec::new(),
        source_groups: vec![0],
    };
    let dir = scratch_dir("empty");
    let report = export_csv(&dir, &output, "20250102").unwrap();
    assert_eq!(header_of(&report.game_indexed_path), GAME_INDEXED_COLUMNS);
    assert_eq!(header_of(&report.player_summary_path), PLAYER_SUMMARY_COLUMNS);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn workbook_is_written() {
    let output = fixture_output();
    let dir = scratch_dir("xlsx");
    let path = dir.join("season.xlsx");
    export_workbook(&path, &output).unwrap();
    let meta = fs::metadata(&path).unwrap();
    assert!(meta.len() > 0);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn failed_summary_write_leaves_no_tables_behind() {
    let output = fixture_output();
    let dir = scratch_dir("partial");
    // A directory where the summary temp file should go makes that write fail.
    fs::create_dir_all(dir.join("player_summary_20250103.csv.tmp")).unwrap();

    assert!(export_csv(&dir, &output, "20250103").is_err());
    assert!(!dir.join("game_indexed_20250103.csv").exists());
    assert!(!dir.join("game_indexed_20250103.csv.tmp").exists());
    assert!(!dir.join("player_summary_20250103.csv").exists());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn uncommitted_stage_is_discarded() {
    let output = fixture_output();
    let dir = scratch_dir("discard");
    let workbook = dir.join("book").join("season.xlsx");
    let staged = StagedExport::stage(&dir, &output, "20250104", Some(&workbook)).unwrap();
    assert!(dir.join("game_indexed_20250104.csv.tmp").is_file());
    drop(staged);

    let left: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    assert!(left.is_empty(), "{left:?}");
    assert!(!workbook.exists());
    assert!(!workbook.with_extension("xlsx.tmp").exists());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn committed_stage_moves_every_file() {
    let output = fixture_output();
    let dir = scratch_dir("commit");
    let workbook = dir.join("season.xlsx");
    let report = StagedExport::stage(&dir, &output, "20250105", Some(&workbook))
        .unwrap()
        .commit()
        .unwrap();
    assert!(report.game_indexed_path.is_file());
    assert!(report.player_summary_path.is_file());
    assert_eq!(report.workbook_path.as_deref(), Some(workbook.as_path()));
    assert!(workbook.is_file());
    assert!(!dir.join("game_indexed_20250105.csv.tmp").exists());
    fs::remove_dir_all(&dir).ok();
}
