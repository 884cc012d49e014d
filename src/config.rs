use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CACHE_DIR: &str = "gng_terminal";
const DB_FILE: &str = "soccer_etl.sqlite";

/// Base column names of one repeated game-group in the wide sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTemplate {
    pub team: String,
    pub team_points: String,
    pub goals: String,
    pub total: String,
}

impl Default for GroupTemplate {
    fn default() -> Self {
        Self {
            team: "team".to_string(),
            team_points: "team_pts".to_string(),
            goals: "goals".to_string(),
            total: "total".to_string(),
        }
    }
}

impl GroupTemplate {
    pub fn names(&self) -> [&str; 4] {
        [&self.team, &self.team_points, &self.goals, &self.total]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonLayout {
    pub first_column: String,
    pub last_column: String,
    pub template: GroupTemplate,
    /// Number of candidate group indices, `0..max_groups`.
    pub max_groups: usize,
}

impl Default for SeasonLayout {
    fn default() -> Self {
        Self {
            first_column: "first".to_string(),
            last_column: "last".to_string(),
            template: GroupTemplate::default(),
            max_groups: 39,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records to skip before the header record (title block of the workbook).
    pub header_row: usize,
    pub layout: SeasonLayout,
    pub impute_columns: Vec<String>,
    pub allow_negative: bool,
    pub output_dir: PathBuf,
    pub db_path: Option<PathBuf>,
    pub roster_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            header_row: 6,
            layout: SeasonLayout::default(),
            impute_columns: vec!["goals".to_string(), "team_pts".to_string()],
            allow_negative: false,
            output_dir: PathBuf::from("etl_output"),
            db_path: None,
            roster_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str::<Self>(&raw)
            .with_context(|| format!("parse config {}", path.display()))
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay `GNG_*` variables resolved through `lookup`. Blank or
    /// unparsable values leave the current setting alone.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(n) = get("GNG_HEADER_ROW").and_then(|v| v.parse::<usize>().ok()) {
            self.header_row = n;
        }
        if let Some(n) = get("GNG_MAX_GROUPS").and_then(|v| v.parse::<usize>().ok()) {
            self.layout.max_groups = n;
        }
        if let Some(raw) = get("GNG_IMPUTE_COLS") {
            let cols = raw
                .split([',', ';', ' '])
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            if !cols.is_empty() {
                self.impute_columns = cols;
            }
        }
        if let Some(flag) = get("GNG_ALLOW_NEGATIVE").and_then(|v| parse_bool(&v)) {
            self.allow_negative = flag;
        }
        if let Some(dir) = get("GNG_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("GNG_DB_PATH") {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("GNG_ROSTER_PATH") {
            self.roster_path = Some(PathBuf::from(path));
        }
    }

    /// Defaults, then `--config <file>`, then the environment, then flags.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut cfg = match arg_value(args, "--config") {
            Some(path) => Self::load_file(Path::new(&path))?,
            None => Self::default(),
        };
        cfg.apply_env();

        if let Some(raw) = arg_value(args, "--header-row") {
            cfg.header_row = raw
                .parse()
                .with_context(|| format!("invalid --header-row {raw:?}"))?;
        }
        if let Some(raw) = arg_value(args, "--max-groups") {
            cfg.layout.max_groups = raw
                .parse()
                .with_context(|| format!("invalid --max-groups {raw:?}"))?;
        }
        if let Some(dir) = arg_value(args, "--out") {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = arg_value(args, "--db") {
            cfg.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = arg_value(args, "--roster") {
            cfg.roster_path = Some(PathBuf::from(path));
        }
        if has_flag(args, "--allow-negative") {
            cfg.allow_negative = true;
        }
        Ok(cfg)
    }

    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.db_path.clone().or_else(default_db_path)
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

/// Value of `--name value` or `--name=value`, ignoring blanks.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_overlay_applies_known_keys() {
        let env = HashMap::from([
            ("GNG_HEADER_ROW", "0"),
            ("GNG_MAX_GROUPS", "12"),
            ("GNG_IMPUTE_COLS", "Goals; total"),
            ("GNG_ALLOW_NEGATIVE", "yes"),
            ("GNG_DB_PATH", " /tmp/x.sqlite "),
        ]);
        let mut cfg = PipelineConfig::default();
        cfg.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.header_row, 0);
        assert_eq!(cfg.layout.max_groups, 12);
        assert_eq!(cfg.impute_columns, vec!["goals", "total"]);
        assert!(cfg.allow_negative);
        assert_eq!(cfg.db_path, Some(PathBuf::from("/tmp/x.sqlite")));
    }

    #[test]
    fn env_overlay_ignores_blank_and_garbage() {
        let env = HashMap::from([("GNG_HEADER_ROW", "six"), ("GNG_OUTPUT_DIR", "  ")]);
        let mut cfg = PipelineConfig::default();
        cfg.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"header_row": 2, "layout": {"max_groups": 5}}"#).unwrap();
        assert_eq!(cfg.header_row, 2);
        assert_eq!(cfg.layout.max_groups, 5);
        assert_eq!(cfg.layout.first_column, "first");
        assert_eq!(cfg.impute_columns, vec!["goals", "team_pts"]);
    }

    #[test]
    fn arg_value_accepts_both_forms() {
        let args = vec![
            "--input".to_string(),
            "season.csv".to_string(),
            "--db=out.sqlite".to_string(),
        ];
        assert_eq!(arg_value(&args, "--input").as_deref(), Some("season.csv"));
        assert_eq!(arg_value(&args, "--db").as_deref(), Some("out.sqlite"));
        assert_eq!(arg_value(&args, "--out"), None);
    }

    #[test]
    fn flags_win_over_defaults() {
        let args: Vec<String> = ["--header-row", "3", "--db=runs.sqlite", "--allow-negative"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cfg = PipelineConfig::from_args(&args).unwrap();
        assert_eq!(cfg.header_row, 3);
        assert_eq!(cfg.db_path, Some(PathBuf::from("runs.sqlite")));
        assert!(cfg.allow_negative);

        let bad = vec!["--header-row".to_string(), "x".to_string()];
        assert!(PipelineConfig::from_args(&bad).is_err());
    }
}
