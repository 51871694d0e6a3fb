use thiserror::Error;

/// Errors surfaced by the matching layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Fusion weights or thresholds are out of range. Fatal: a misconfigured
    /// engine must not silently score with garbage weights.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}
