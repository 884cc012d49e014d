use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use gng_terminal::cluster::{ClusterConfig, cluster_games};
use gng_terminal::config::PipelineConfig;
use gng_terminal::pipeline;
use gng_terminal::ranking::{competition_ranks, percentile_ranks};
use gng_terminal::reshape::group_column_name;
use gng_terminal::sheet::WideTable;

const PLAYERS: usize = 40;
const GROUPS: usize = 39;

/// Full-width season sheet; every seventh cell set carries an averaged value.
fn synthetic_sheet() -> WideTable {
    let mut columns = vec!["last".to_string(), "first".to_string()];
    for g in 0..GROUPS {
        for base in ["team", "team_pts", "goals", "total"] {
            columns.push(group_column_name(base, g));
        }
    }
    let rows = (0..PLAYERS)
        .map(|p| {
            let mut row = vec![format!("Last{p:02}"), format!("First{p:02}")];
            for g in 0..GROUPS {
                let seed = (p * 31 + g * 17) % 23;
                let goals = if seed % 7 == 0 {
                    format!("{:.2}", seed as f64 / 3.0)
                } else {
                    (seed % 4).to_string()
                };
                row.push(if g % 2 == 0 { "Red" } else { "Blue" }.to_string());
                row.push((seed % 4).to_string());
                row.push(goals);
                row.push((seed % 13 + 2).to_string());
            }
            row
        })
        .collect();
    WideTable::new(columns, rows)
}

fn bench_pipeline_run(c: &mut Criterion) {
    let table = synthetic_sheet();
    let cfg = PipelineConfig::default();
    c.bench_function("pipeline_run_40x39", |b| {
        b.iter(|| {
            let out = pipeline::run(black_box(&table), &cfg).unwrap();
            black_box(out.games.len());
        })
    });
}

fn bench_rank_primitives(c: &mut Criterion) {
    let values: Vec<Option<f64>> = (0..PLAYERS * GROUPS)
        .map(|i| (i % 11 != 0).then(|| ((i * 37) % 101) as f64))
        .collect();
    c.bench_function("competition_and_percentile_ranks", |b| {
        b.iter(|| {
            let ranks = competition_ranks(black_box(&values));
            let pct = percentile_ranks(black_box(&values));
            black_box((ranks.len(), pct.len()));
        })
    });
}

fn bench_cluster_games(c: &mut Criterion) {
    let out = pipeline::run(&synthetic_sheet(), &PipelineConfig::default()).unwrap();
    let cfg = ClusterConfig::default();
    c.bench_function("cluster_games_k3", |b| {
        b.iter(|| {
            let result = cluster_games(black_box(&out.games), &cfg).unwrap();
            black_box(result.inertia);
        })
    });
}

criterion_group!(
    perf,
    bench_pipeline_run,
    bench_rank_primitives,
    bench_cluster_games
);
criterion_main!(perf);
