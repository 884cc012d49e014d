use serde::{Deserialize, Serialize};

/// One player in one game, as produced by the reshaper.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub first: String,
    pub last: String,
    /// `first + " " + last`; unique per sheet.
    pub player_name: String,
    /// Dense, 1-based position among eligible game-groups.
    pub game_index: u32,
    /// Group index in the source sheet (0 = unsuffixed columns).
    pub source_group: usize,
    pub team: Option<String>,
    pub team_points: Option<f64>,
    pub goals: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeMethod {
    Observed,
    PlayerAverage,
}

impl ImputeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ImputeMethod::Observed => "observed",
            ImputeMethod::PlayerAverage => "player_average",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "observed" => Some(ImputeMethod::Observed),
            "player_average" => Some(ImputeMethod::PlayerAverage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImputationFlag {
    pub is_imputed: bool,
    pub method: ImputeMethod,
}

impl ImputationFlag {
    pub fn from_imputed(is_imputed: bool) -> Self {
        Self {
            is_imputed,
            method: if is_imputed {
                ImputeMethod::PlayerAverage
            } else {
                ImputeMethod::Observed
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub record: GameRecord,
    pub flag: ImputationFlag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedGameRecord {
    pub record: GameRecord,
    pub flag: ImputationFlag,
    /// `None` when the game total is missing.
    pub rank_in_game: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeasonTrack {
    pub cumulative_goals: Option<f64>,
    pub cumulative_score: Option<f64>,
    pub cumulative_rank: Option<u32>,
    pub cumulative_percentile: Option<f64>,
    pub cumulative_goals_percentile: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRow {
    pub record: GameRecord,
    pub flag: ImputationFlag,
    pub rank_in_game: Option<u32>,
    pub track: SeasonTrack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonSummary {
    pub player: String,
    pub total_goals: f64,
    pub overall_score: f64,
    pub avg_score_per_game: Option<f64>,
    pub games_played_total: u32,
    pub games_played_actual: u32,
    pub max_total: Option<f64>,
    pub min_total: Option<f64>,
    pub avg_goals_per_game: Option<f64>,
}

/// Flat shape of the persisted `game_indexed` table, in export column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameIndexedRow {
    pub last: String,
    pub first: String,
    pub team: Option<String>,
    pub team_pts: Option<f64>,
    pub goals: Option<f64>,
    pub total: Option<f64>,
    pub game_index: u32,
    pub is_imputed: bool,
    pub impute_method: ImputeMethod,
    pub player: String,
    pub rank_in_game: Option<u32>,
    pub cumulative_goals: Option<f64>,
    pub cumulative_score: Option<f64>,
    pub cumulative_rank: Option<u32>,
    pub cumulative_percentile: Option<f64>,
    pub cumulative_goals_percentile: Option<f64>,
}

pub const GAME_INDEXED_COLUMNS: [&str; 16] = [
    "last",
    "first",
    "team",
    "team_pts",
    "goals",
    "total",
    "game_index",
    "is_imputed",
    "impute_method",
    "player",
    "rank_in_game",
    "cumulative_goals",
    "cumulative_score",
    "cumulative_rank",
    "cumulative_percentile",
    "cumulative_goals_percentile",
];

pub const PLAYER_SUMMARY_COLUMNS: [&str; 9] = [
    "player",
    "total_goals",
    "overall_score",
    "avg_score_per_game",
    "games_played_total",
    "games_played_actual",
    "max_total",
    "min_total",
    "avg_goals_per_game",
];

impl From<&SeasonRow> for GameIndexedRow {
    fn from(row: &SeasonRow) -> Self {
        let r = &row.record;
        Self {
            last: r.last.clone(),
            first: r.first.clone(),
            team: r.team.clone(),
            team_pts: r.team_points,
            goals: r.goals,
            total: r.total,
            game_index: r.game_index,
            is_imputed: row.flag.is_imputed,
            impute_method: row.flag.method,
            player: r.player_name.clone(),
            rank_in_game: row.rank_in_game,
            cumulative_goals: row.track.cumulative_goals,
            cumulative_score: row.track.cumulative_score,
            cumulative_rank: row.track.cumulative_rank,
            cumulative_percentile: row.track.cumulative_percentile,
            cumulative_goals_percentile: row.track.cumulative_goals_percentile,
        }
    }
}
