//! Deterministic stub providers.
//!
//! Vectors are built from per-token hashes (bag-of-token sinusoids,
//! L2-normalized), so two texts sharing tokens land near each other while
//! everything stays reproducible with no model on the machine. The stubs
//! double as the offline fallback providers and as the instrumented
//! providers the integration suite counts calls on.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ProviderError;
use crate::provider::{ElementEmbedder, QueryEmbedder, Reranker};

fn token_vector(token: &str, dim: usize, out: &mut [f32]) {
    let h = fxhash::hash64(token.as_bytes());
    for (i, slot) in out.iter_mut().enumerate().take(dim) {
        *slot += (((h >> (i % 32)) as f32) * 0.0001).sin();
    }
}

fn l2_normalize_in_place(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Bag-of-token embedding: deterministic, shared tokens pull texts together.
pub fn stub_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0f32; dim];
    let mut any = false;
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        any = true;
        token_vector(&token.to_lowercase(), dim, &mut v);
    }
    if !any {
        token_vector("", dim, &mut v);
    }
    l2_normalize_in_place(&mut v);
    v
}

/// Token-overlap score in [0, 1]: the stub re-ranker's notion of relevance.
fn overlap_score(query: &str, fragment: &str) -> f32 {
    let tokens = |s: &str| -> Vec<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    };
    let q = tokens(query);
    if q.is_empty() {
        return 0.0;
    }
    let f = tokens(fragment);
    let hits = q.iter().filter(|t| f.contains(t)).count();
    hits as f32 / q.len() as f32
}

/// Deterministic query embedder with optional injected latency.
pub struct StubQueryEmbedder {
    model_id: String,
    dim: usize,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StubQueryEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            model_id: "stub-query-v1".into(),
            dim,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Inject per-call latency (deadline tests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryEmbedder for StubQueryEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(stub_vector(text, self.dim))
    }
}

/// Deterministic element embedder; counts embedded fragments.
pub struct StubElementEmbedder {
    model_id: String,
    dim: usize,
    latency: Option<Duration>,
    embedded: AtomicUsize,
}

impl StubElementEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            model_id: "stub-element-v1".into(),
            dim,
            latency: None,
            embedded: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Total fragments embedded over the provider's lifetime.
    pub fn embedded_count(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ElementEmbedder for StubElementEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, fragments: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.embedded.fetch_add(fragments.len(), Ordering::SeqCst);
        Ok(fragments
            .iter()
            .map(|fragment| stub_vector(fragment, self.dim))
            .collect())
    }
}

/// Token-overlap re-ranker; counts scoring calls.
pub struct StubReranker {
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StubReranker {
    pub fn new() -> Self {
        Self {
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for StubReranker {
    async fn score(&self, query: &str, fragment: &str) -> Result<f32, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(overlap_score(query, fragment))
    }
}
