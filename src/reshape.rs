use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::SeasonLayout;
use crate::error::{PipelineError, Result};
use crate::model::GameRecord;
use crate::sheet::WideTable;

/// Column positions of one eligible game-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameColumnGroup {
    pub source_index: usize,
    pub team: usize,
    pub team_points: usize,
    pub goals: usize,
    pub total: usize,
}

/// Column name of `base` for group `index`: bare for 0, `.N` otherwise.
pub fn group_column_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}.{index}")
    }
}

/// Eligible groups in increasing source index. A group missing any of its
/// four columns is skipped without reserving a slot.
pub fn resolve_groups(table: &WideTable, layout: &SeasonLayout) -> Vec<GameColumnGroup> {
    let t = &layout.template;
    let mut groups = Vec::new();
    for index in 0..layout.max_groups {
        let find = |base: &str| table.column(&group_column_name(base, index));
        let (Some(team), Some(team_points), Some(goals), Some(total)) = (
            find(&t.team),
            find(&t.team_points),
            find(&t.goals),
            find(&t.total),
        ) else {
            debug!(group = index, "game-group not present in sheet; skipped");
            continue;
        };
        groups.push(GameColumnGroup {
            source_index: index,
            team,
            team_points,
            goals,
            total,
        });
    }
    groups
}

pub fn reshape(table: &WideTable, layout: &SeasonLayout) -> Result<Vec<GameRecord>> {
    let first_col = table.column(&layout.first_column).ok_or_else(|| {
        PipelineError::schema(format!("identity column `{}` missing", layout.first_column))
    })?;
    let last_col = table.column(&layout.last_column).ok_or_else(|| {
        PipelineError::schema(format!("identity column `{}` missing", layout.last_column))
    })?;

    let groups = resolve_groups(table, layout);
    if groups.is_empty() {
        return Err(PipelineError::schema(format!(
            "no complete game-group among {} candidates ({})",
            layout.max_groups,
            layout.template.names().join(", ")
        )));
    }

    let players = player_rows(table, first_col, last_col)?;

    let mut out = Vec::with_capacity(groups.len() * players.len());
    for (slot, group) in groups.iter().enumerate() {
        let game_index = (slot + 1) as u32;
        for (row, first, last) in &players {
            let t = &layout.template;
            out.push(GameRecord {
                first: first.clone(),
                last: last.clone(),
                player_name: format!("{first} {last}"),
                game_index,
                source_group: group.source_index,
                team: text_cell(table.cell(*row, group.team)),
                team_points: numeric_cell(table, *row, group.team_points, &t.team_points, group)?,
                goals: numeric_cell(table, *row, group.goals, &t.goals, group)?,
                total: numeric_cell(table, *row, group.total, &t.total, group)?,
            });
        }
    }

    info!(
        players = players.len(),
        games = groups.len(),
        rows = out.len(),
        "reshaped season sheet"
    );
    Ok(out)
}

/// Data rows that name a player, with their identity cells.
fn player_rows(
    table: &WideTable,
    first_col: usize,
    last_col: usize,
) -> Result<Vec<(usize, String, String)>> {
    let mut seen = HashSet::new();
    let mut players = Vec::new();
    for row in 0..table.len() {
        let first = table.cell(row, first_col).trim();
        let last = table.cell(row, last_col).trim();
        if first.is_empty() && last.is_empty() {
            continue;
        }
        let name = format!("{first} {last}");
        if !seen.insert(name.clone()) {
            return Err(PipelineError::DuplicatePlayer(name));
        }
        players.push((row, first.to_string(), last.to_string()));
    }
    Ok(players)
}

fn text_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn numeric_cell(
    table: &WideTable,
    row: usize,
    col: usize,
    base: &str,
    group: &GameColumnGroup,
) -> Result<Option<f64>> {
    let raw = table.cell(row, col).trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(PipelineError::InvalidValue {
            column: group_column_name(base, group.source_index),
            row,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn suffix_convention() {
        assert_eq!(group_column_name("goals", 0), "goals");
        assert_eq!(group_column_name("goals", 7), "goals.7");
    }

    #[test]
    fn partial_group_is_not_eligible() {
        let table = WideTable::new(
            cols(&[
                "last", "first", "team", "team_pts", "goals", "total", "team.1", "goals.1",
                "total.1",
            ]),
            vec![],
        );
        let groups = resolve_groups(&table, &SeasonLayout::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].source_index, 0);
    }

    #[test]
    fn blank_identity_rows_are_skipped() {
        let table = WideTable::new(
            cols(&["last", "first", "team", "team_pts", "goals", "total"]),
            vec![
                cols(&["Doe", "Jane", "Red", "3", "1", "4"]),
                cols(&["", "", "", "", "", "40"]),
            ],
        );
        let rows = reshape(&table, &SeasonLayout::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player_name, "Jane Doe");
    }

    #[test]
    fn non_numeric_metric_is_rejected() {
        let table = WideTable::new(
            cols(&["last", "first", "team", "team_pts", "goals", "total"]),
            vec![cols(&["Doe", "Jane", "Red", "3", "two", "4"])],
        );
        let err = reshape(&table, &SeasonLayout::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidValue { ref column, .. } if column == "goals"));
    }
}
