use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::{ClassifiedRecord, RankedGameRecord};

const STAGE: &str = "per-game ranking";

/// Competition ranks, descending. Missing values get no rank and are not
/// counted.
pub fn competition_ranks(values: &[Option<f64>]) -> Vec<Option<u32>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    present.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut out = vec![None; values.len()];
    let mut rank = 0u32;
    let mut last: Option<f64> = None;
    for (pos, (idx, v)) in present.into_iter().enumerate() {
        if last != Some(v) {
            rank = (pos + 1) as u32;
            last = Some(v);
        }
        out[idx] = Some(rank);
    }
    out
}

/// Fraction of present values `<=` each value, in `(0, 1]`.
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    values
        .iter()
        .map(|v| {
            v.map(|v| {
                let at_or_below = sorted.partition_point(|x| *x <= v);
                at_or_below as f64 / n
            })
        })
        .collect()
}

/// Row positions grouped by game index, partitions in ascending key order and
/// rows in input order.
pub fn partition_by_game(keys: impl Iterator<Item = u32>) -> Vec<(u32, Vec<usize>)> {
    let mut map: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, key) in keys.enumerate() {
        map.entry(key).or_default().push(i);
    }
    map.into_iter().collect()
}

pub fn guard_partition(game_index: u32, rows: &[usize], stage: &'static str) -> Result<()> {
    if rows.is_empty() {
        return Err(PipelineError::EmptyPartition { game_index, stage });
    }
    Ok(())
}

pub fn rank_games(records: Vec<ClassifiedRecord>) -> Result<Vec<RankedGameRecord>> {
    let partitions = partition_by_game(records.iter().map(|r| r.record.game_index));

    let ranked: Vec<(Vec<usize>, Vec<Option<u32>>)> = partitions
        .par_iter()
        .map(|(game_index, rows)| {
            guard_partition(*game_index, rows, STAGE)?;
            let totals: Vec<Option<f64>> = rows.iter().map(|&i| records[i].record.total).collect();
            Ok((rows.clone(), competition_ranks(&totals)))
        })
        .collect::<Result<_>>()?;

    let mut rank_of = vec![None; records.len()];
    for (rows, ranks) in ranked {
        for (i, rank) in rows.into_iter().zip(ranks) {
            rank_of[i] = rank;
        }
    }

    info!(
        rows = records.len(),
        partitions = partitions.len(),
        "ranked games"
    );
    Ok(records
        .into_iter()
        .zip(rank_of)
        .map(|(r, rank_in_game)| RankedGameRecord {
            record: r.record,
            flag: r.flag,
            rank_in_game,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_share_minimum_rank() {
        let ranks = competition_ranks(&[Some(10.0), Some(7.0), Some(10.0)]);
        assert_eq!(ranks, vec![Some(1), Some(3), Some(1)]);
    }

    #[test]
    fn rank_resumes_after_tie_block() {
        let ranks = competition_ranks(&[Some(5.0), Some(9.0), Some(9.0), Some(9.0), Some(1.0)]);
        assert_eq!(ranks, vec![Some(4), Some(1), Some(1), Some(1), Some(5)]);
    }

    #[test]
    fn missing_values_are_unranked() {
        let ranks = competition_ranks(&[None, Some(2.0), Some(3.0)]);
        assert_eq!(ranks, vec![None, Some(2), Some(1)]);
    }

    #[test]
    fn percentile_counts_at_or_below() {
        let pct = percentile_ranks(&[Some(10.0), Some(7.0), Some(10.0), Some(1.0)]);
        assert_eq!(pct, vec![Some(1.0), Some(0.5), Some(1.0), Some(0.25)]);
    }

    #[test]
    fn percentile_ignores_missing_in_denominator() {
        let pct = percentile_ranks(&[Some(3.0), None]);
        assert_eq!(pct, vec![Some(1.0), None]);
    }

    #[test]
    fn partitions_preserve_input_order() {
        let parts = partition_by_game([2, 1, 2, 1].into_iter());
        assert_eq!(parts, vec![(1, vec![1, 3]), (2, vec![0, 2])]);
    }

    #[test]
    fn empty_partition_is_an_error() {
        let err = guard_partition(4, &[], STAGE).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyPartition { game_index: 4, .. }));
    }
}
