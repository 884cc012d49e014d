use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::model::{ClassifiedRecord, GameRecord, ImputationFlag};

const STAGE: &str = "imputation classifier";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImputableMetric {
    Goals,
    TeamPoints,
}

impl ImputableMetric {
    /// Accepts the long-table column names (`goals`, `team_pts`).
    pub fn from_column(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "goals" => Some(ImputableMetric::Goals),
            "team_pts" | "team_points" => Some(ImputableMetric::TeamPoints),
            _ => None,
        }
    }

    pub fn value(self, record: &GameRecord) -> Option<f64> {
        match self {
            ImputableMetric::Goals => record.goals,
            ImputableMetric::TeamPoints => record.team_points,
        }
    }
}

pub fn resolve_metrics(columns: &[String]) -> Result<Vec<ImputableMetric>> {
    let mut out = Vec::with_capacity(columns.len());
    for col in columns {
        let metric = ImputableMetric::from_column(col)
            .ok_or_else(|| PipelineError::missing_column(col.clone(), STAGE))?;
        if !out.contains(&metric) {
            out.push(metric);
        }
    }
    Ok(out)
}

/// Fill-ins are player averages and come out fractional; recorded values are
/// whole. A blank cell counts as not observed.
pub fn is_estimated(value: Option<f64>) -> bool {
    match value {
        Some(v) => v % 1.0 != 0.0,
        None => true,
    }
}

pub fn classify(records: Vec<GameRecord>, columns: &[String]) -> Result<Vec<ClassifiedRecord>> {
    let metrics = resolve_metrics(columns)?;

    let out: Vec<ClassifiedRecord> = records
        .into_iter()
        .map(|record| {
            let imputed = metrics.iter().any(|m| is_estimated(m.value(&record)));
            ClassifiedRecord {
                record,
                flag: ImputationFlag::from_imputed(imputed),
            }
        })
        .collect();

    let imputed = out.iter().filter(|r| r.flag.is_imputed).count();
    if imputed > 0 {
        warn!(
            imputed,
            rows = out.len(),
            "rows carry estimated values (fractional-part heuristic)"
        );
    }
    info!(rows = out.len(), "classified observations");
    Ok(out)
}
