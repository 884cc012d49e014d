use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Identity or template columns are missing, or no game-group is usable.
    #[error("schema error: {0}")]
    Schema(String),

    /// A metric column a stage depends on is not part of the table.
    #[error("missing column `{column}` required by {stage}")]
    MissingColumn { column: String, stage: &'static str },

    /// A ranking or percentile pass was handed a partition with no rows.
    #[error("empty partition for game index {game_index} in {stage}")]
    EmptyPartition { game_index: u32, stage: &'static str },

    /// A numeric cell that does not parse as a finite number.
    #[error("invalid value {value:?} in column `{column}` (data row {row})")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("negative {metric} ({value}) for {player} at game {game_index}")]
    NegativeValue {
        player: String,
        game_index: u32,
        metric: &'static str,
        value: f64,
    },

    #[error("duplicate player name {0:?} in roster sheet")]
    DuplicatePlayer(String),

    #[error("clustering error: {0}")]
    Cluster(String),
}

impl PipelineError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn missing_column(column: impl Into<String>, stage: &'static str) -> Self {
        Self::MissingColumn {
            column: column.into(),
            stage,
        }
    }
}
