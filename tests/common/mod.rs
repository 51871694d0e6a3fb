//! Shared fixtures for the integration suite: an engine wired to the
//! deterministic stub providers, plus raw-snapshot builders.
#![allow(dead_code)]

use std::sync::Arc;

use selectron::{
    Engine, EngineConfig, RawElement, RawSnapshot, StubElementEmbedder, StubQueryEmbedder,
    StubReranker,
};

pub const DIM: usize = 64;

pub struct Harness {
    pub engine: Arc<Engine>,
    pub query: Arc<StubQueryEmbedder>,
    pub elements: Arc<StubElementEmbedder>,
    pub reranker: Arc<StubReranker>,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::in_memory())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    harness_with_providers(
        config,
        StubQueryEmbedder::new(DIM),
        StubElementEmbedder::new(DIM),
        StubReranker::new(),
    )
}

pub fn harness_with_providers(
    config: EngineConfig,
    query: StubQueryEmbedder,
    elements: StubElementEmbedder,
    reranker: StubReranker,
) -> Harness {
    let query = Arc::new(query);
    let elements = Arc::new(elements);
    let reranker = Arc::new(reranker);
    let engine = Engine::new(
        config,
        query.clone(),
        elements.clone(),
        reranker.clone(),
    )
    .expect("engine construction");
    Harness {
        engine,
        query,
        elements,
        reranker,
    }
}

pub fn el(id: u64, tag: &str, text: &str, attrs: &[(&str, &str)]) -> RawElement {
    RawElement {
        backend_id: Some(id),
        tag: Some(tag.into()),
        text: Some(text.into()),
        attrs: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..Default::default()
    }
}

pub fn child(id: u64, parent: u64, tag: &str, text: &str, attrs: &[(&str, &str)]) -> RawElement {
    let mut element = el(id, tag, text, attrs);
    element.parent_id = Some(parent);
    element
}

pub fn page(path: &str, elements: Vec<RawElement>) -> RawSnapshot {
    RawSnapshot {
        origin: "https://app.example.com".into(),
        path: path.into(),
        elements,
    }
}
