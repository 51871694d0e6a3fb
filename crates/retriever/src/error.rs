use thiserror::Error;

use canonical::CanonicalError;

/// Fatal errors from the orchestrator.
///
/// Everything else — provider timeouts, disk loss, non-unique selectors,
/// no candidate above the floor — is either a degraded reason or an
/// operational status on the result, never an `Err`.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// The snapshot could not be canonicalized (malformed input).
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    /// Engine configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The caller cancelled the retrieval.
    #[error("retrieval cancelled")]
    Cancelled,
    /// `navigate`/`wait` intents address no element; routing them is the
    /// calling layer's job.
    #[error("action `{0}` does not address an element")]
    NonElementAction(&'static str),
}
