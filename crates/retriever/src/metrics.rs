// Metrics hooks for the retriever.
//
// Callers install a global `RetrieverMetrics` implementation via
// [`set_retriever_metrics`]; every `Session::retrieve` then reports its
// latency, mode, and terminal status. This keeps instrumentation decoupled
// from any specific metrics backend.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

/// Metrics observer for retrieval operations.
pub trait RetrieverMetrics: Send + Sync {
    /// Record the outcome of one retrieval: terminal `status` name, index
    /// reuse `mode` name, and wall-clock latency.
    fn record_retrieve(&self, status: &str, mode: &str, latency: Duration);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn RetrieverMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn RetrieverMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn RetrieverMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global retriever metrics recorder.
///
/// Typically called once during service startup so every engine shares the
/// same backend.
pub fn set_retriever_metrics(recorder: Option<Arc<dyn RetrieverMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}
