use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::model::{GameIndexedRow, PlayerSeasonSummary};
use crate::ranking::competition_ranks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    AllPlayers,
    SelectPlayers(Vec<String>),
    TopOverall(usize),
    MostImproved(usize),
    BottomOverall(usize),
}

impl ViewMode {
    pub fn label(&self) -> String {
        match self {
            ViewMode::AllPlayers => "All players".to_string(),
            ViewMode::SelectPlayers(p) => format!("Selected players ({})", p.len()),
            ViewMode::TopOverall(n) => format!("Top {n} overall"),
            ViewMode::MostImproved(n) => format!("Top {n} most improved"),
            ViewMode::BottomOverall(n) => format!("Bottom {n} overall"),
        }
    }

    /// Fixed modes the dashboard cycles through.
    pub fn dashboard_cycle() -> Vec<ViewMode> {
        vec![
            ViewMode::AllPlayers,
            ViewMode::TopOverall(5),
            ViewMode::MostImproved(5),
            ViewMode::BottomOverall(5),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub player: String,
    pub last: String,
    pub game_index: u32,
    pub cumulative_rank: Option<u32>,
    pub cumulative_score: Option<f64>,
    pub cumulative_goals: Option<f64>,
    pub is_imputed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankChange {
    pub player: String,
    pub start_rank: Option<u32>,
    pub end_rank: Option<u32>,
    /// Positive when the player climbed.
    pub improvement: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleStat {
    pub player: String,
    pub total_goals: f64,
    pub total_points: f64,
    pub games_played: u32,
    pub imputed_games: u32,
    pub final_rank: Option<u32>,
    pub imputed_percent: f64,
    pub bubble_size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub player: String,
    pub total_points: f64,
    pub total_goals: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoalsHeatmap {
    pub players: Vec<String>,
    pub last_names: Vec<String>,
    pub game_indices: Vec<u32>,
    /// `values[player][game]`, missing cells as 0.
    pub values: Vec<Vec<f64>>,
    pub imputed: Vec<Vec<bool>>,
}

impl GoalsHeatmap {
    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }
}

/// Player rows ordered by game index.
fn by_player(games: &[GameIndexedRow]) -> BTreeMap<&str, Vec<&GameIndexedRow>> {
    let mut map: BTreeMap<&str, Vec<&GameIndexedRow>> = BTreeMap::new();
    for g in games {
        map.entry(g.player.as_str()).or_default().push(g);
    }
    for rows in map.values_mut() {
        rows.sort_by_key(|g| g.game_index);
    }
    map
}

fn rank_order(a: Option<u32>, b: Option<u32>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Each player's row at their last game, best cumulative rank first.
pub fn final_standings(games: &[GameIndexedRow]) -> Vec<Standing> {
    let mut out: Vec<Standing> = by_player(games)
        .into_values()
        .filter_map(|rows| rows.last().copied())
        .map(|g| Standing {
            player: g.player.clone(),
            last: g.last.clone(),
            game_index: g.game_index,
            cumulative_rank: g.cumulative_rank,
            cumulative_score: g.cumulative_score,
            cumulative_goals: g.cumulative_goals,
            is_imputed: g.is_imputed,
        })
        .collect();
    out.sort_by(|a, b| rank_order(a.cumulative_rank, b.cumulative_rank).then(a.player.cmp(&b.player)));
    out
}

/// Start and end cumulative rank (first and last ranked game), biggest climb
/// first.
pub fn rank_changes(games: &[GameIndexedRow]) -> Vec<RankChange> {
    let mut out: Vec<RankChange> = by_player(games)
        .into_iter()
        .map(|(player, rows)| {
            let start_rank = rows.iter().find_map(|g| g.cumulative_rank);
            let end_rank = rows.iter().rev().find_map(|g| g.cumulative_rank);
            let improvement = match (start_rank, end_rank) {
                (Some(s), Some(e)) => Some(i64::from(s) - i64::from(e)),
                _ => None,
            };
            RankChange {
                player: player.to_string(),
                start_rank,
                end_rank,
                improvement,
            }
        })
        .collect();
    out.sort_by(|a, b| match (a.improvement, b.improvement) {
        (Some(x), Some(y)) => y.cmp(&x).then(a.player.cmp(&b.player)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.player.cmp(&b.player),
    });
    out
}

/// Players shown by `mode`, in the order the mode ranks them.
pub fn select_players(games: &[GameIndexedRow], mode: &ViewMode) -> Vec<String> {
    match mode {
        ViewMode::AllPlayers => by_player(games).keys().map(|p| p.to_string()).collect(),
        ViewMode::SelectPlayers(wanted) => {
            let known: BTreeSet<&str> = games.iter().map(|g| g.player.as_str()).collect();
            let mut seen: HashSet<String> = HashSet::new();
            wanted
                .iter()
                .filter(|p| known.contains(p.as_str()) && seen.insert((*p).clone()))
                .cloned()
                .collect()
        }
        ViewMode::TopOverall(n) => final_standings(games)
            .into_iter()
            .take(*n)
            .map(|s| s.player)
            .collect(),
        ViewMode::BottomOverall(n) => {
            let standings = final_standings(games);
            let skip = standings.len().saturating_sub(*n);
            standings.into_iter().skip(skip).map(|s| s.player).collect()
        }
        ViewMode::MostImproved(n) => rank_changes(games)
            .into_iter()
            .take(*n)
            .map(|c| c.player)
            .collect(),
    }
}

pub fn filter_view(
    games: &[GameIndexedRow],
    summaries: &[PlayerSeasonSummary],
    mode: &ViewMode,
) -> (Vec<GameIndexedRow>, Vec<PlayerSeasonSummary>) {
    let players: HashSet<String> = select_players(games, mode).into_iter().collect();
    let games = games
        .iter()
        .filter(|g| players.contains(&g.player))
        .cloned()
        .collect();
    let summaries = summaries
        .iter()
        .filter(|s| players.contains(&s.player))
        .cloned()
        .collect();
    (games, summaries)
}

fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (v * scale).round() / scale
}

/// Goals vs final rank, sized down by the share of estimated games.
pub fn bubble_stats(games: &[GameIndexedRow]) -> Vec<BubbleStat> {
    by_player(games)
        .into_iter()
        .map(|(player, rows)| {
            let total_goals: f64 = rows.iter().filter_map(|g| g.goals).sum();
            let total_points: f64 = rows.iter().filter_map(|g| g.total).sum();
            let games_played = rows.len() as u32;
            let imputed_games = rows.iter().filter(|g| g.is_imputed).count() as u32;
            let final_rank = rows.last().and_then(|g| g.cumulative_rank);
            let imputed_percent = if games_played == 0 {
                0.0
            } else {
                round_to(100.0 * imputed_games as f64 / games_played as f64, 2)
            };
            BubbleStat {
                player: player.to_string(),
                total_goals: total_goals.round(),
                total_points,
                games_played,
                imputed_games,
                final_rank,
                imputed_percent,
                bubble_size: 100.0 - (imputed_percent / 25.0) * 60.0,
            }
        })
        .collect()
}

/// Season points per player, highest first.
pub fn points_leaderboard(games: &[GameIndexedRow]) -> Vec<LeaderboardEntry> {
    let mut out: Vec<LeaderboardEntry> = by_player(games)
        .into_iter()
        .map(|(player, rows)| LeaderboardEntry {
            player: player.to_string(),
            total_points: rows.iter().filter_map(|g| g.total).sum(),
            total_goals: rows.iter().filter_map(|g| g.goals).sum(),
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_points
            .total_cmp(&a.total_points)
            .then(a.player.cmp(&b.player))
    });
    out
}

/// Player x game grid of goals, players alphabetical by last name.
pub fn goals_heatmap(games: &[GameIndexedRow]) -> GoalsHeatmap {
    let grouped = by_player(games);
    let game_indices: Vec<u32> = games
        .iter()
        .map(|g| g.game_index)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut players: Vec<(&str, &str)> = grouped
        .iter()
        .filter_map(|(player, rows)| rows.first().map(|g| (*player, g.last.as_str())))
        .collect();
    players.sort_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)));

    let mut heat = GoalsHeatmap {
        game_indices: game_indices.clone(),
        ..GoalsHeatmap::default()
    };
    for (player, last) in players {
        let mut values = vec![0.0; game_indices.len()];
        let mut imputed = vec![false; game_indices.len()];
        for g in grouped.get(player).into_iter().flatten() {
            if let Ok(col) = game_indices.binary_search(&g.game_index) {
                values[col] = g.goals.unwrap_or(0.0);
                imputed[col] = g.is_imputed;
            }
        }
        heat.players.push(player.to_string());
        heat.last_names.push(last.to_string());
        heat.values.push(values);
        heat.imputed.push(imputed);
    }
    heat
}

/// Competition rank of `overall_score` across the given summaries.
pub fn summary_final_ranks(summaries: &[PlayerSeasonSummary]) -> Vec<(String, Option<u32>)> {
    let scores: Vec<Option<f64>> = summaries.iter().map(|s| Some(s.overall_score)).collect();
    summaries
        .iter()
        .zip(competition_ranks(&scores))
        .map(|(s, r)| (s.player.clone(), r))
        .collect()
}

/// Per player: `(game_index, cumulative_rank, is_imputed)` in game order.
pub fn rank_trajectories(games: &[GameIndexedRow]) -> Vec<(String, Vec<(u32, Option<u32>, bool)>)> {
    by_player(games)
        .into_iter()
        .map(|(player, rows)| {
            let points = rows
                .iter()
                .map(|g| (g.game_index, g.cumulative_rank, g.is_imputed))
                .collect();
            (player.to_string(), points)
        })
        .collect()
}
