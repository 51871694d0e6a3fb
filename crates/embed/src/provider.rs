//! Provider traits and the deadline/cancellation wrapper around them.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::ProviderError;

/// Produces query vectors (dimension `Dq`).
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    /// Stable identifier of the model; part of every cache key.
    fn model_id(&self) -> &str;
    /// Vector dimension this model emits.
    fn dim(&self) -> usize;
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Produces element vectors (dimension `De`) from canonical fragments.
#[async_trait]
pub trait ElementEmbedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Largest batch the provider accepts; the caller splits beyond it.
    fn max_batch(&self) -> usize {
        32
    }
    async fn embed_batch(&self, fragments: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Second-stage structural scorer over `(query, fragment-with-context)`.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score in [0, 1]; dimension and mechanics are provider-internal.
    async fn score(&self, query: &str, fragment: &str) -> Result<f32, ProviderError>;
}

/// Cooperative cancellation signal for one orchestrator call.
///
/// Cloned handles observe the same flag. The orchestrator checks it between
/// pipeline states; in-flight provider calls race it via [`with_deadline`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; wakes every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Arm the waiter before checking the flag so a cancel between
            // check and await cannot be lost.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Run a provider future under a deadline, racing the cancellation token.
pub async fn with_deadline<T, F>(
    deadline_ms: u64,
    cancel: &CancelToken,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if cancel.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        outcome = tokio::time::timeout(Duration::from_millis(deadline_ms), call) => {
            match outcome {
                Ok(result) => result,
                Err(_) => Err(ProviderError::DeadlineExceeded(deadline_ms)),
            }
        }
    }
}
