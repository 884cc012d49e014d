use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::imputation;
use crate::model::{GameIndexedRow, PlayerSeasonSummary};
use crate::ranking;
use crate::reshape;
use crate::season;
use crate::sheet::WideTable;

/// Both tables of one run. Nothing is produced unless every stage succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub games: Vec<GameIndexedRow>,
    pub summaries: Vec<PlayerSeasonSummary>,
    /// Source group indices that became game indices 1, 2, ...
    pub source_groups: Vec<usize>,
}

impl PipelineOutput {
    pub fn games_played(&self) -> usize {
        self.source_groups.len()
    }

    pub fn players(&self) -> usize {
        self.summaries.len()
    }
}

pub fn run(table: &WideTable, cfg: &PipelineConfig) -> Result<PipelineOutput> {
    let records = reshape::reshape(table, &cfg.layout)?;
    let source_groups: Vec<usize> = reshape::resolve_groups(table, &cfg.layout)
        .iter()
        .map(|g| g.source_index)
        .collect();

    let classified = imputation::classify(records, &cfg.impute_columns)?;
    let ranked = ranking::rank_games(classified)?;
    let tracked = season::track_season(ranked, cfg.allow_negative)?;
    let summaries = season::summarize(&tracked);
    let games: Vec<GameIndexedRow> = tracked.iter().map(GameIndexedRow::from).collect();

    info!(
        rows = games.len(),
        players = summaries.len(),
        games = source_groups.len(),
        "pipeline run complete"
    );
    Ok(PipelineOutput {
        games,
        summaries,
        source_groups,
    })
}
