use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::Level;

use gng_terminal::config::{PipelineConfig, arg_value, has_flag};
use gng_terminal::export::{self, StagedExport};
use gng_terminal::pipeline;
use gng_terminal::sheet::WideTable;
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

    let input = arg_value(&args, "--input")
        .or_else(|| std::env::var("GNG_INPUT").ok())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing --input <season workbook or csv>"))?;
    let cfg = PipelineConfig::from_args(&args)?;

    let table = WideTable::from_path(&input, cfg.header_row)?;
    let output = pipeline::run(&table, &cfg)
        .with_context(|| format!("pipeline failed for {}", input.display()))?;

    // Files are staged first and only moved into place once the database
    // replace has succeeded.
    let workbook = arg_value(&args, "--xlsx").map(PathBuf::from);
    let staged = StagedExport::stage(
        &cfg.output_dir,
        &output,
        &export::date_stamp(),
        workbook.as_deref(),
    )?;

    let (report, run) = if has_flag(&args, "--no-db") {
        (staged.commit()?, None)
    } else {
        let db_path = cfg
            .resolved_db_path()
            .context("unable to resolve sqlite path")?;
        let mut conn = store::open_db(&db_path)?;
        let (run, report) = store::replace_tables_then(
            &mut conn,
            &output,
            &input.display().to_string(),
            || staged.commit(),
        )?;
        (report, Some((db_path, run)))
    };

    println!("Season ETL complete");
    println!("Input: {}", input.display());
    println!(
        "Games: {} (source groups {:?})",
        output.games_played(),
        output.source_groups
    );
    println!("Players: {}", output.players());
    let imputed = output.games.iter().filter(|g| g.is_imputed).count();
    println!("Game rows: {} ({} estimated)", report.game_rows, imputed);
    println!("CSV: {}", report.game_indexed_path.display());
    println!("CSV: {}", report.player_summary_path.display());
    if let Some(path) = &report.workbook_path {
        println!("Workbook: {}", path.display());
    }
    match run {
        Some((db_path, run)) => println!("DB: {} (run #{})", db_path.display(), run.run_id),
        None => println!("DB: skipped"),
    }

    let mut leaders = output.summaries.iter().collect::<Vec<_>>();
    leaders.sort_by(|a, b| {
        b.overall_score
            .total_cmp(&a.overall_score)
            .then(a.player.cmp(&b.player))
    });
    for s in leaders.iter().take(5) {
        println!(
            "{:<24} score={:.1} goals={:.0} played={}/{}",
            s.player, s.overall_score, s.total_goals, s.games_played_actual, s.games_played_total
        );
    }
    Ok(())
}
