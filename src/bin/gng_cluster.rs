use anyhow::{Context, Result};
use tracing::{Level, info};

use gng_terminal::cluster::{self, ClusterConfig};
use gng_terminal::config::{PipelineConfig, arg_value, has_flag};
use gng_terminal::store;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let level = if has_flag(&args, "--verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let cfg = PipelineConfig::from_args(&args)?;
    let mut params = ClusterConfig::default();
    if let Some(raw) = arg_value(&args, "--k") {
        params.k = raw.parse().with_context(|| format!("invalid --k {raw:?}"))?;
    }
    if let Some(raw) = arg_value(&args, "--seed") {
        params.seed = raw
            .parse()
            .with_context(|| format!("invalid --seed {raw:?}"))?;
    }
    if let Some(raw) = arg_value(&args, "--features") {
        let names: Vec<String> = raw.split(',').map(|s| s.to_string()).collect();
        params.features = cluster::resolve_features(&names)?;
    }

    let db_path = cfg
        .resolved_db_path()
        .context("unable to resolve sqlite path")?;
    let conn = store::open_db(&db_path)?;
    let games = store::load_game_indexed(&conn)?;
    info!(rows = games.len(), db = %db_path.display(), "loaded game rows");

    let result = cluster::cluster_games(&games, &params)?;
    let unlabeled = result.labels.iter().filter(|l| l.is_none()).count();

    println!("Game clustering complete");
    println!("DB: {}", db_path.display());
    println!(
        "Features: {}",
        params
            .features
            .iter()
            .map(|f| f.column())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("k={} seed={}", params.k, params.seed);
    println!(
        "Inertia: {:.3} after {} iterations",
        result.inertia, result.iterations
    );
    println!("Rows skipped (missing feature): {unlabeled}");
    for (idx, (size, centroid)) in result.sizes().iter().zip(&result.centroids).enumerate() {
        let coords = centroid
            .iter()
            .map(|v| format!("{v:+.2}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("cluster {idx}: rows={size} centroid=[{coords}]");
    }
    Ok(())
}
