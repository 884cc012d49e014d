use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::{PlayerSeasonSummary, RankedGameRecord, SeasonRow, SeasonTrack};
use crate::ranking::{competition_ranks, guard_partition, partition_by_game, percentile_ranks};

const STAGE: &str = "season aggregator";

/// Running goals/score per player, summed left to right by ascending game
/// index. A missing value leaves that row's running value unset but does not
/// reset the sum.
pub fn cumulative_sums(records: &[RankedGameRecord]) -> Vec<(Option<f64>, Option<f64>)> {
    let mut by_player: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, r) in records.iter().enumerate() {
        by_player.entry(r.record.player_name.as_str()).or_default().push(i);
    }

    let mut out = vec![(None, None); records.len()];
    for rows in by_player.values_mut() {
        rows.sort_by_key(|&i| records[i].record.game_index);
        let mut goals = 0.0;
        let mut score = 0.0;
        for &i in rows.iter() {
            let r = &records[i].record;
            let g = r.goals.map(|v| {
                goals += v;
                goals
            });
            let s = r.total.map(|v| {
                score += v;
                score
            });
            out[i] = (g, s);
        }
    }
    out
}

pub fn reject_negative(records: &[RankedGameRecord]) -> Result<()> {
    for r in records {
        let rec = &r.record;
        for (metric, value) in [("goals", rec.goals), ("total", rec.total)] {
            if let Some(v) = value.filter(|v| *v < 0.0) {
                return Err(PipelineError::NegativeValue {
                    player: rec.player_name.clone(),
                    game_index: rec.game_index,
                    metric,
                    value: v,
                });
            }
        }
    }
    Ok(())
}

/// Attach the season track to every row. Cross-player columns are computed
/// per game index once every running sum is known.
pub fn track_season(records: Vec<RankedGameRecord>, allow_negative: bool) -> Result<Vec<SeasonRow>> {
    if !allow_negative {
        reject_negative(&records)?;
    }

    let sums = cumulative_sums(&records);
    let partitions = partition_by_game(records.iter().map(|r| r.record.game_index));

    let per_partition: Vec<(Vec<usize>, Vec<SeasonTrack>)> = partitions
        .par_iter()
        .map(|(game_index, rows)| {
            guard_partition(*game_index, rows, STAGE)?;
            let goals: Vec<Option<f64>> = rows.iter().map(|&i| sums[i].0).collect();
            let score: Vec<Option<f64>> = rows.iter().map(|&i| sums[i].1).collect();
            let ranks = competition_ranks(&score);
            let score_pct = percentile_ranks(&score);
            let goals_pct = percentile_ranks(&goals);
            let tracks = (0..rows.len())
                .map(|k| SeasonTrack {
                    cumulative_goals: goals[k],
                    cumulative_score: score[k],
                    cumulative_rank: ranks[k],
                    cumulative_percentile: score_pct[k],
                    cumulative_goals_percentile: goals_pct[k],
                })
                .collect();
            Ok((rows.clone(), tracks))
        })
        .collect::<Result<_>>()?;

    let mut track_of = vec![SeasonTrack::default(); records.len()];
    for (rows, tracks) in per_partition {
        for (i, track) in rows.into_iter().zip(tracks) {
            track_of[i] = track;
        }
    }

    info!(
        rows = records.len(),
        partitions = partitions.len(),
        "computed season tracks"
    );
    Ok(records
        .into_iter()
        .zip(track_of)
        .map(|(r, track)| SeasonRow {
            record: r.record,
            flag: r.flag,
            rank_in_game: r.rank_in_game,
            track,
        })
        .collect())
}

#[derive(Default)]
struct SummaryAcc {
    goals_sum: f64,
    goals_n: u32,
    total_sum: f64,
    total_n: u32,
    games: u32,
    actual: u32,
    max_total: Option<f64>,
    min_total: Option<f64>,
}

/// One row per player, ordered by player name.
pub fn summarize(rows: &[SeasonRow]) -> Vec<PlayerSeasonSummary> {
    let mut by_player: BTreeMap<&str, Vec<&SeasonRow>> = BTreeMap::new();
    for row in rows {
        by_player.entry(row.record.player_name.as_str()).or_default().push(row);
    }

    by_player
        .into_iter()
        .map(|(player, mut games)| {
            games.sort_by_key(|r| r.record.game_index);
            let mut acc = SummaryAcc::default();
            for r in games {
                acc.games += 1;
                if !r.flag.is_imputed {
                    acc.actual += 1;
                }
                if let Some(g) = r.record.goals {
                    acc.goals_sum += g;
                    acc.goals_n += 1;
                }
                if let Some(t) = r.record.total {
                    acc.total_sum += t;
                    acc.total_n += 1;
                    acc.max_total = Some(acc.max_total.map_or(t, |m| m.max(t)));
                    acc.min_total = Some(acc.min_total.map_or(t, |m| m.min(t)));
                }
            }
            PlayerSeasonSummary {
                player: player.to_string(),
                total_goals: acc.goals_sum,
                overall_score: acc.total_sum,
                avg_score_per_game: mean(acc.total_sum, acc.total_n),
                games_played_total: acc.games,
                games_played_actual: acc.actual,
                max_total: acc.max_total,
                min_total: acc.min_total,
                avg_goals_per_game: mean(acc.goals_sum, acc.goals_n),
            }
        })
        .collect()
}

fn mean(sum: f64, n: u32) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GameRecord, ImputationFlag};

    fn ranked(player: &str, game_index: u32, goals: Option<f64>, total: Option<f64>) -> RankedGameRecord {
        RankedGameRecord {
            record: GameRecord {
                first: player.to_string(),
                last: "X".to_string(),
                player_name: format!("{player} X"),
                game_index,
                source_group: game_index as usize - 1,
                team: None,
                team_points: Some(3.0),
                goals,
                total,
            },
            flag: ImputationFlag::from_imputed(goals.is_none()),
            rank_in_game: None,
        }
    }

    #[test]
    fn sums_follow_game_order_not_input_order() {
        let records = vec![
            ranked("a", 2, Some(1.0), Some(4.0)),
            ranked("a", 1, Some(2.0), Some(6.0)),
            ranked("a", 3, None, Some(1.0)),
        ];
        let sums = cumulative_sums(&records);
        assert_eq!(sums[1], (Some(2.0), Some(6.0)));
        assert_eq!(sums[0], (Some(3.0), Some(10.0)));
        assert_eq!(sums[2], (None, Some(11.0)));
    }

    #[test]
    fn tied_running_scores_share_rank_and_percentile() {
        let records = vec![
            ranked("a", 1, Some(1.0), Some(5.0)),
            ranked("b", 1, Some(1.0), Some(5.0)),
            ranked("c", 1, Some(0.0), Some(2.0)),
        ];
        let rows = track_season(records, false).unwrap();
        let ranks: Vec<_> = rows.iter().map(|r| r.track.cumulative_rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(1), Some(3)]);
        assert_eq!(rows[0].track.cumulative_percentile, Some(1.0));
        assert_eq!(rows[1].track.cumulative_percentile, Some(1.0));
        let low = rows[2].track.cumulative_goals_percentile.unwrap();
        assert!((low - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn negative_goals_rejected_before_tracking() {
        let records = vec![ranked("a", 1, Some(-1.0), Some(5.0))];
        let err = track_season(records, false).unwrap_err();
        assert!(matches!(err, PipelineError::NegativeValue { metric: "goals", .. }));
    }

    #[test]
    fn summary_skips_missing_values() {
        let records = vec![
            ranked("a", 1, Some(2.0), Some(8.0)),
            ranked("a", 2, None, None),
            ranked("a", 3, Some(1.0), Some(4.0)),
        ];
        let rows = track_season(records, false).unwrap();
        let summary = &summarize(&rows)[0];
        assert_eq!(summary.total_goals, 3.0);
        assert_eq!(summary.overall_score, 12.0);
        assert_eq!(summary.avg_score_per_game, Some(6.0));
        assert_eq!(summary.avg_goals_per_game, Some(1.5));
        assert_eq!(summary.games_played_total, 3);
        assert_eq!(summary.games_played_actual, 2);
        assert_eq!((summary.max_total, summary.min_total), (Some(8.0), Some(4.0)));
    }
}
