use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::model::{
    GAME_INDEXED_COLUMNS, GameIndexedRow, PLAYER_SUMMARY_COLUMNS, PlayerSeasonSummary,
};
use crate::pipeline::PipelineOutput;

pub struct ExportReport {
    pub game_indexed_path: PathBuf,
    pub player_summary_path: PathBuf,
    pub workbook_path: Option<PathBuf>,
    pub game_rows: usize,
    pub summary_rows: usize,
}

/// Today's date as used in export file names (`YYYYMMDD`).
pub fn date_stamp() -> String {
    Local::now().format("%Y%m%d").to_string()
}

/// Export files written next to their targets but not yet in place.
/// Dropping an uncommitted export removes its temp files.
pub struct StagedExport {
    moves: Vec<(PathBuf, PathBuf)>,
    report: ExportReport,
    committed: bool,
}

impl StagedExport {
    /// Stage `game_indexed_<stamp>.csv` and `player_summary_<stamp>.csv` in
    /// `dir`, plus the workbook when `workbook` is set.
    pub fn stage(
        dir: &Path,
        output: &PipelineOutput,
        stamp: &str,
        workbook: Option<&Path>,
    ) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create export dir {}", dir.display()))?;

        let game_indexed_path = dir.join(format!("game_indexed_{stamp}.csv"));
        let player_summary_path = dir.join(format!("player_summary_{stamp}.csv"));
        let mut staged = StagedExport {
            moves: Vec::new(),
            report: ExportReport {
                game_indexed_path: game_indexed_path.clone(),
                player_summary_path: player_summary_path.clone(),
                workbook_path: workbook.map(Path::to_path_buf),
                game_rows: output.games.len(),
                summary_rows: output.summaries.len(),
            },
            committed: false,
        };

        let tmp = staged.reserve(&game_indexed_path, "csv.tmp");
        write_csv(&tmp, &GAME_INDEXED_COLUMNS, &output.games)?;
        let tmp = staged.reserve(&player_summary_path, "csv.tmp");
        write_csv(&tmp, &PLAYER_SUMMARY_COLUMNS, &output.summaries)?;
        if let Some(path) = workbook {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create workbook dir {}", parent.display()))?;
            }
            let tmp = staged.reserve(path, "xlsx.tmp");
            write_workbook(&tmp, output)?;
        }
        Ok(staged)
    }

    /// Temp path for `target`, tracked so a failed stage cleans it up.
    fn reserve(&mut self, target: &Path, extension: &str) -> PathBuf {
        let tmp = target.with_extension(extension);
        self.moves.push((tmp.clone(), target.to_path_buf()));
        tmp
    }

    pub fn commit(mut self) -> Result<ExportReport> {
        for (tmp, target) in &self.moves {
            fs::rename(tmp, target)
                .with_context(|| format!("move {} into place", target.display()))?;
        }
        self.committed = true;
        Ok(ExportReport {
            game_indexed_path: std::mem::take(&mut self.report.game_indexed_path),
            player_summary_path: std::mem::take(&mut self.report.player_summary_path),
            workbook_path: self.report.workbook_path.take(),
            game_rows: self.report.game_rows,
            summary_rows: self.report.summary_rows,
        })
    }
}

impl Drop for StagedExport {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (tmp, _) in &self.moves {
            if tmp.is_file() {
                fs::remove_file(tmp).ok();
            }
        }
    }
}

/// Write both CSV tables into `dir`, replacing files of the same name. On
/// error neither file is touched.
pub fn export_csv(dir: &Path, output: &PipelineOutput, stamp: &str) -> Result<ExportReport> {
    StagedExport::stage(dir, output, stamp, None)?.commit()
}

/// Serde writes the header with the first row; an empty table still gets one.
fn write_csv<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("open csv {}", path.display()))?;
    if rows.is_empty() {
        writer.write_record(columns).context("write csv header")?;
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("write csv row to {}", path.display()))?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}

enum Cell {
    Text(String),
    Number(f64),
    Flag(bool),
    Blank,
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Blank)
    }
}

impl From<Option<u32>> for Cell {
    fn from(v: Option<u32>) -> Self {
        v.map(|n| Cell::Number(n as f64)).unwrap_or(Cell::Blank)
    }
}

/// Both tables in one workbook, sheets `GameIndexed` and `PlayerSummary`.
pub fn export_workbook(path: &Path, output: &PipelineOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create workbook dir {}", parent.display()))?;
        }
    }
    write_workbook(path, output)
}

fn write_workbook(path: &Path, output: &PipelineOutput) -> Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("GameIndexed")?;
        write_header(sheet, &GAME_INDEXED_COLUMNS)?;
        let rows: Vec<Vec<Cell>> = output.games.iter().map(game_cells).collect();
        write_rows(sheet, &rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("PlayerSummary")?;
        write_header(sheet, &PLAYER_SUMMARY_COLUMNS)?;
        let rows: Vec<Vec<Cell>> = output.summaries.iter().map(summary_cells).collect();
        write_rows(sheet, &rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn game_cells(g: &GameIndexedRow) -> Vec<Cell> {
    vec![
        Cell::Text(g.last.clone()),
        Cell::Text(g.first.clone()),
        g.team.clone().map(Cell::Text).unwrap_or(Cell::Blank),
        g.team_pts.into(),
        g.goals.into(),
        g.total.into(),
        Cell::Number(g.game_index as f64),
        Cell::Flag(g.is_imputed),
        Cell::Text(g.impute_method.as_str().to_string()),
        Cell::Text(g.player.clone()),
        g.rank_in_game.into(),
        g.cumulative_goals.into(),
        g.cumulative_score.into(),
        g.cumulative_rank.into(),
        g.cumulative_percentile.into(),
        g.cumulative_goals_percentile.into(),
    ]
}

fn summary_cells(s: &PlayerSeasonSummary) -> Vec<Cell> {
    vec![
        Cell::Text(s.player.clone()),
        Cell::Number(s.total_goals),
        Cell::Number(s.overall_score),
        s.avg_score_per_game.into(),
        Cell::Number(s.games_played_total as f64),
        Cell::Number(s.games_played_actual as f64),
        s.max_total.into(),
        s.min_total.into(),
        s.avg_goals_per_game.into(),
    ]
}

fn write_header(worksheet: &mut Worksheet, columns: &[&str]) -> Result<()> {
    for (col_idx, name) in columns.iter().enumerate() {
        worksheet
            .write_string(0, col_idx as u16, *name)
            .with_context(|| format!("write header cell {col_idx}"))?;
    }
    Ok(())
}

/// Data rows start below the header.
fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (idx, row) in rows.iter().enumerate() {
        let row_idx = (idx + 1) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let col = col_idx as u16;
            match cell {
                Cell::Text(v) => worksheet.write_string(row_idx, col, v).map(|_| ()),
                Cell::Number(v) => worksheet.write_number(row_idx, col, *v).map(|_| ()),
                Cell::Flag(v) => worksheet.write_boolean(row_idx, col, *v).map(|_| ()),
                Cell::Blank => Ok(()),
            }
            .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
