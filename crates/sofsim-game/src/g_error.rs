// g_error.rs — error type for the simulation core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("entity pool exhausted ({max} slots)")]
    PoolExhausted { max: usize },

    #[error("invalid entity index {index}")]
    InvalidEntity { index: i32 },

    #[error("stale entity handle")]
    StaleHandle,

    #[error("entity {index} ({classname}): {reason}")]
    EntityFault {
        index: usize,
        classname: String,
        reason: String,
    },

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("save/load: {0}")]
    Save(String),

    #[error("save version {found}, expected {expected}")]
    SaveVersion { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entity string line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl GameError {
    /// Global failures stop the tick; everything else is contained to one entity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::PoolExhausted { .. })
    }
}

pub type GameResult<T> = Result<T, GameError>;
