use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{PipelineError, Result};
use crate::model::GameIndexedRow;

const STAGE: &str = "game clustering";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterFeature {
    Goals,
    TeamPoints,
    RankInGame,
    CumulativeScore,
    CumulativePercentile,
}

impl ClusterFeature {
    pub fn from_column(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "goals" => Some(ClusterFeature::Goals),
            "team_pts" => Some(ClusterFeature::TeamPoints),
            "rank_in_game" => Some(ClusterFeature::RankInGame),
            "cumulative_score" => Some(ClusterFeature::CumulativeScore),
            "cumulative_percentile" => Some(ClusterFeature::CumulativePercentile),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            ClusterFeature::Goals => "goals",
            ClusterFeature::TeamPoints => "team_pts",
            ClusterFeature::RankInGame => "rank_in_game",
            ClusterFeature::CumulativeScore => "cumulative_score",
            ClusterFeature::CumulativePercentile => "cumulative_percentile",
        }
    }

    pub fn value(self, row: &GameIndexedRow) -> Option<f64> {
        match self {
            ClusterFeature::Goals => row.goals,
            ClusterFeature::TeamPoints => row.team_pts,
            ClusterFeature::RankInGame => row.rank_in_game.map(f64::from),
            ClusterFeature::CumulativeScore => row.cumulative_score,
            ClusterFeature::CumulativePercentile => row.cumulative_percentile,
        }
    }

    pub fn defaults() -> Vec<ClusterFeature> {
        vec![
            ClusterFeature::Goals,
            ClusterFeature::TeamPoints,
            ClusterFeature::RankInGame,
            ClusterFeature::CumulativeScore,
        ]
    }
}

pub fn resolve_features(names: &[String]) -> Result<Vec<ClusterFeature>> {
    names
        .iter()
        .map(|n| {
            ClusterFeature::from_column(n).ok_or_else(|| PipelineError::missing_column(n.clone(), STAGE))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub features: Vec<ClusterFeature>,
    pub k: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iter: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            features: ClusterFeature::defaults(),
            k: 3,
            seed: 42,
            restarts: 10,
            max_iter: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Aligned with the input rows; `None` where a feature was missing.
    pub labels: Vec<Option<usize>>,
    /// Centroids in standardized units.
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub iterations: usize,
}

impl Clustering {
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for label in self.labels.iter().flatten() {
            sizes[*label] += 1;
        }
        sizes
    }
}

/// Column-wise `(x - mean) / std` with population std; a constant column is
/// only centered.
pub fn standardize(points: &mut [Vec<f64>]) {
    let Some(dims) = points.first().map(Vec::len) else {
        return;
    };
    let n = points.len() as f64;
    for d in 0..dims {
        let mean = points.iter().map(|p| p[d]).sum::<f64>() / n;
        let var = points.iter().map(|p| (p[d] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let scale = if std > 0.0 { std } else { 1.0 };
        for p in points.iter_mut() {
            p[d] = (p[d] - mean) / scale;
        }
    }
}

pub fn cluster_games(rows: &[GameIndexedRow], cfg: &ClusterConfig) -> Result<Clustering> {
    if cfg.features.is_empty() {
        return Err(PipelineError::Cluster("no features selected".to_string()));
    }

    let mut kept = Vec::new();
    let mut points = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let values: Option<Vec<f64>> = cfg.features.iter().map(|f| f.value(row)).collect();
        if let Some(values) = values {
            kept.push(i);
            points.push(values);
        }
    }

    if cfg.k == 0 || cfg.k > points.len() {
        return Err(PipelineError::Cluster(format!(
            "k = {} with {} complete rows",
            cfg.k,
            points.len()
        )));
    }

    standardize(&mut points);

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut best: Option<(Vec<usize>, Vec<Vec<f64>>, f64, usize)> = None;
    for _ in 0..cfg.restarts.max(1) {
        let init = plus_plus_init(&points, cfg.k, &mut rng);
        let run = lloyd(&points, init, cfg.max_iter);
        if best.as_ref().is_none_or(|b| run.2 < b.2) {
            best = Some(run);
        }
    }
    let Some((assign, centroids, inertia, iterations)) = best else {
        return Err(PipelineError::Cluster("no clustering run completed".to_string()));
    };

    let mut labels = vec![None; rows.len()];
    for (pos, &row) in kept.iter().enumerate() {
        labels[row] = Some(assign[pos]);
    }
    Ok(Clustering {
        labels,
        centroids,
        inertia,
        iterations,
    })
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(p: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.iter().enumerate() {
        let d = sq_dist(p, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

/// First centroid uniform, the rest drawn proportional to squared distance
/// from the nearest chosen one.
fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
    while centroids.len() < k {
        let dists: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = dists.iter().sum();
        if total <= 0.0 {
            // Every point sits on a centroid already.
            centroids.push(points[rng.gen_range(0..points.len())].clone());
            continue;
        }
        let mut target = rng.gen_range(0.0..total);
        let mut pick = points.len() - 1;
        for (i, d) in dists.iter().enumerate() {
            if target < *d {
                pick = i;
                break;
            }
            target -= d;
        }
        centroids.push(points[pick].clone());
    }
    centroids
}

fn lloyd(
    points: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iter: usize,
) -> (Vec<usize>, Vec<Vec<f64>>, f64, usize) {
    let dims = centroids[0].len();
    let mut assign = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let (c, _) = nearest(p, &centroids);
            if assign[i] != c {
                assign[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0; dims]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (p, &c) in points.iter().zip(&assign) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(p) {
                *s += v;
            }
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            // Empty clusters keep their previous position.
            if counts[c] > 0 {
                for (x, s) in centroid.iter_mut().zip(&sums[c]) {
                    *x = s / counts[c] as f64;
                }
            }
        }
    }

    let inertia = points
        .iter()
        .zip(&assign)
        .map(|(p, &c)| sq_dist(p, &centroids[c]))
        .sum();
    (assign, centroids, inertia, iterations)
}
