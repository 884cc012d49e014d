use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::PlayerSeasonSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryWithRoster {
    pub summary: PlayerSeasonSummary,
    pub position: Option<String>,
    pub height: Option<String>,
    pub year: Option<String>,
}

pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open roster {}", path.display()))?;
    read_roster(file).with_context(|| format!("read roster {}", path.display()))
}

/// Extra columns in the roster file are ignored.
pub fn read_roster<R: Read>(reader: R) -> Result<Vec<RosterEntry>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (idx, rec) in rdr.deserialize::<RosterEntry>().enumerate() {
        out.push(rec.with_context(|| format!("decode roster record {idx}"))?);
    }
    Ok(out)
}

/// Left join on player name: every summary survives, unmatched ones carry no
/// roster fields. A player listed twice in the roster keeps the first entry.
pub fn join_roster(
    summaries: &[PlayerSeasonSummary],
    roster: &[RosterEntry],
) -> Vec<SummaryWithRoster> {
    let mut by_player: HashMap<&str, &RosterEntry> = HashMap::new();
    for entry in roster {
        by_player.entry(entry.player.as_str()).or_insert(entry);
    }

    summaries
        .iter()
        .map(|s| {
            let entry = by_player.get(s.player.as_str());
            SummaryWithRoster {
                summary: s.clone(),
                position: entry.and_then(|e| e.position.clone()),
                height: entry.and_then(|e| e.height.clone()),
                year: entry.and_then(|e| e.year.clone()),
            }
        })
        .collect()
}

/// Dashboard filter over joined summary rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RosterFilter {
    #[default]
    All,
    Position(String),
    Year(String),
}

impl RosterFilter {
    /// `All`, then every distinct position, then every distinct class year,
    /// each group sorted.
    pub fn cycle(entries: &[RosterEntry]) -> Vec<RosterFilter> {
        let positions: BTreeSet<&str> =
            entries.iter().filter_map(|e| e.position.as_deref()).collect();
        let years: BTreeSet<&str> = entries.iter().filter_map(|e| e.year.as_deref()).collect();
        std::iter::once(RosterFilter::All)
            .chain(positions.into_iter().map(|p| RosterFilter::Position(p.to_string())))
            .chain(years.into_iter().map(|y| RosterFilter::Year(y.to_string())))
            .collect()
    }

    /// Rows without a roster match only pass `All`.
    pub fn matches(&self, row: &SummaryWithRoster) -> bool {
        match self {
            RosterFilter::All => true,
            RosterFilter::Position(p) => row.position.as_deref() == Some(p.as_str()),
            RosterFilter::Year(y) => row.year.as_deref() == Some(y.as_str()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            RosterFilter::All => "all players".to_string(),
            RosterFilter::Position(p) => format!("position {p}"),
            RosterFilter::Year(y) => format!("class of {y}"),
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}
