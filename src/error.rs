use thiserror::Error;

/// Every failure the simulator can report. None of them are retryable:
/// a run that hits one is abandoned.
#[derive(Debug, Error)]
pub enum SandpileError {
    /// Rejected settings, reported before any grain is dropped
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Grain injection outside the interior of the lattice
    #[error("site ({row}, {col}) is not interior to a grid of side {side}")]
    NotInterior { row: usize, col: usize, side: usize },
    /// A counter would have wrapped
    #[error("counter overflow: {0}")]
    Overflow(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed or truncated binary snapshot
    #[error("bad snapshot: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, SandpileError>;
