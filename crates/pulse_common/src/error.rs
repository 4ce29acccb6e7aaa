//! Error types for the validation engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("voter already voted on this trend")]
    DuplicateVote,

    #[error("trend not found: {0}")]
    TrendNotFound(String),

    #[error("invalid vote value: {0} (expected yes, no, or unsure)")]
    InvalidVoteValue(String),

    #[error("submitter cannot vote on their own trend")]
    SelfVote,

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("storage conflict persisted after {0} retries")]
    ConflictRetriesExhausted(u32),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the error is a transient storage conflict worth retrying
    /// with a fresh read.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Storage(rusqlite::Error::SqliteFailure(f, _)) => matches!(
                f.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
