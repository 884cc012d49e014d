use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use csv::ReaderBuilder;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Header plus raw cell text, one row per player.
#[derive(Debug, Clone, Default)]
pub struct WideTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl WideTable {
    /// Build from an already-normalized header. Rows shorter than the header
    /// are padded with empty cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self {
            columns,
            index,
            rows,
        }
    }

    /// Workbook extensions go through the spreadsheet reader, anything else
    /// is read as comma-delimited text.
    pub fn from_path(path: &Path, header_row: usize) -> Result<Self> {
        if is_workbook(path) {
            return Self::from_workbook(path, header_row)
                .with_context(|| format!("read season workbook {}", path.display()));
        }
        let file =
            File::open(path).with_context(|| format!("open season sheet {}", path.display()))?;
        Self::from_reader(file, header_row)
            .with_context(|| format!("read season sheet {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R, header_row: usize) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let records = rdr.records().enumerate().map(|(idx, rec)| {
            rec.map(|r| r.iter().map(str::to_string).collect())
                .with_context(|| format!("decode csv record {idx}"))
        });
        Self::from_records(records, header_row)
    }

    /// First worksheet of the workbook. Rows and columns before the used
    /// range are kept as blanks so `header_row` counts from the sheet's
    /// first row.
    pub fn from_workbook(path: &Path, header_row: usize) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("open workbook {}", path.display()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("workbook has no worksheets"))?
            .context("read first worksheet")?;

        let (top, left) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let leading = std::iter::repeat_with(Vec::new).take(top);
        let used = range.rows().map(move |cells| {
            let mut row = vec![String::new(); left];
            row.extend(cells.iter().map(cell_text));
            row
        });
        Self::from_records(leading.chain(used).map(Ok), header_row)
    }

    /// Skip `header_row` records, take the next one as the header and the
    /// rest as data.
    pub fn from_records<I>(records: I, header_row: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Vec<String>>>,
    {
        let mut records = records.into_iter();
        for _ in 0..header_row {
            if records.next().transpose()?.is_none() {
                return Err(anyhow!("sheet ended before header record {header_row}"));
            }
        }

        let header = records
            .next()
            .ok_or_else(|| anyhow!("sheet has no header record at offset {header_row}"))?
            .context("decode header record")?;
        let columns = disambiguate(header.iter().map(|h| normalize_header(h)).collect());

        let mut rows = Vec::new();
        for rec in records {
            rows.push(rec?.iter().map(|cell| cell.trim().to_string()).collect());
        }

        Ok(Self::new(columns, rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Integral floats lose the `.0` so they read the same as the CSV export.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// `" Team Pts "` -> `"team_pts"`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Repeated captions get `.1`, `.2`, ... in order of appearance; the first
/// keeps its bare name. Generated names never collide with real ones.
pub fn disambiguate(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = columns.iter().cloned().collect();
    let mut out = Vec::with_capacity(columns.len());
    let mut first_seen = HashSet::new();

    for name in columns {
        if first_seen.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let counter = seen.entry(name.clone()).or_insert(0);
        let mut candidate;
        loop {
            *counter += 1;
            candidate = format!("{name}.{counter}");
            if !taken.contains(&candidate) {
                break;
            }
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_captions_get_numeric_suffixes() {
        let cols = ["last", "first", "team", "goals", "team", "goals", "team"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            disambiguate(cols),
            vec!["last", "first", "team", "goals", "team.1", "goals.1", "team.2"]
        );
    }

    #[test]
    fn generated_suffix_skips_existing_name() {
        let cols = ["team", "team.1", "team"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(disambiguate(cols), vec!["team", "team.1", "team.2"]);
    }

    #[test]
    fn reader_skips_preamble_and_normalizes() {
        let raw = "GnG 2025,,\n,,\nLast, First ,Team Pts\nDoe,Jane,3\nRoe,Rick\n";
        let table = WideTable::from_reader(raw.as_bytes(), 2).unwrap();
        assert_eq!(table.columns(), &["last", "first", "team_pts"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 2), "");
        assert_eq!(table.column("first"), Some(1));
    }

    #[test]
    fn workbook_extensions_pick_the_spreadsheet_reader() {
        assert!(is_workbook(Path::new("season.XLSX")));
        assert!(is_workbook(Path::new("dir/season.xls")));
        assert!(!is_workbook(Path::new("season.csv")));
        assert!(!is_workbook(Path::new("season")));
    }

    #[test]
    fn workbook_cells_render_like_csv_text() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(6.33)), "6.33");
        assert_eq!(cell_text(&Data::Int(-2)), "-2");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Red".into())), "Red");
    }

    #[test]
    fn reader_fails_when_header_offset_past_end() {
        let raw = "a,b\n";
        assert!(WideTable::from_reader(raw.as_bytes(), 3).is_err());
    }
}
