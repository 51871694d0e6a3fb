use thiserror::Error;

/// Errors surfaced by the canonicalization pipeline.
///
/// All variants are fatal for the call that produced them: a snapshot that
/// cannot be canonicalized is malformed input, not a recoverable condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    /// A raw element record lacks one of the minimum required fields.
    #[error("raw element #{index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    /// The raw snapshot carried no element records at all.
    #[error("raw snapshot contains no elements")]
    EmptySnapshot,
    /// Configuration is inconsistent (version 0, uncompilable volatile pattern, ...).
    #[error("invalid canonicalize config: {0}")]
    InvalidConfig(String),
}
