use thiserror::Error;

/// Errors from embedding and re-ranking provider calls.
///
/// Every variant is recoverable: the orchestrator records the reason and
/// continues with the affected axis disabled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The call did not complete within its deadline.
    #[error("provider call exceeded {0} ms deadline")]
    DeadlineExceeded(u64),
    /// The session was cancelled while the call was in flight.
    #[error("provider call cancelled")]
    Cancelled,
    /// The provider itself reported a failure.
    #[error("provider backend error: {0}")]
    Backend(String),
    /// The provider returned a vector of the wrong dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors from the embedding cache.
///
/// Only configuration problems surface to callers; runtime disk errors are
/// absorbed into hot-only degraded mode.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Configuration is inconsistent (zero capacity, zero shards, ...).
    #[error("invalid cache config: {0}")]
    InvalidConfig(String),
    /// The cold-tier store could not be opened at startup.
    #[error("cold tier unavailable: {0}")]
    ColdTier(String),
}
