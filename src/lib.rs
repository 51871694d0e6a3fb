//! Umbrella crate for Selectron: hybrid DOM element retrieval.
//!
//! The `selectron` crate re-exports the canonicalization, intent, embedding,
//! index, matching, synthesis, promotion, and retrieval layers so
//! applications can drive the full pipeline through a single dependency.
//!
//! ## Quick start
//!
//! Build an [`Engine`] from an [`EngineConfig`] plus the three provider
//! handles, open a [`Session`], and feed it intents and raw snapshots:
//!
//! ```no_run
//! use std::sync::Arc;
//! use selectron::{
//!     CancelToken, Engine, EngineConfig, RawElement, RawSnapshot,
//!     StubElementEmbedder, StubQueryEmbedder, StubReranker,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(
//!     EngineConfig::in_memory(),
//!     Arc::new(StubQueryEmbedder::new(128)),
//!     Arc::new(StubElementEmbedder::new(128)),
//!     Arc::new(StubReranker::new()),
//! )?;
//! let mut session = engine.session();
//!
//! let raw = RawSnapshot {
//!     origin: "https://app.example.com".into(),
//!     path: "/login".into(),
//!     elements: vec![RawElement {
//!         backend_id: Some(1),
//!         tag: Some("button".into()),
//!         text: Some("Sign In".into()),
//!         ..Default::default()
//!     }],
//! };
//! let intent = selectron::parse_intent(r#"Click "Sign In""#)?;
//! let result = session.retrieve(&intent, &raw, &CancelToken::new()).await?;
//! assert_eq!(result.xpath, r#"//button[normalize-space()="Sign In"]"#);
//!
//! // Tell the store how it went; the next identical retrieval
//! // short-circuits through the promotion path.
//! let snapshot = selectron::canonicalize(&raw, &selectron::CanonicalizeConfig::default())?;
//! session.report_outcome(
//!     snapshot.page_signature,
//!     snapshot.descriptors[0].frame_hash,
//!     intent.label_key,
//!     &result.xpath,
//!     true,
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! - [`canonicalize`]: raw browser records → [`Snapshot`] of [`Descriptor`]s.
//! - [`parse_intent`]: the quoted-target instruction grammar → [`Intent`].
//! - [`EmbeddingCache`] and the provider traits: content-addressed vectors.
//! - Per-frame vector indexes with cold/warm/delta reuse.
//! - Intent-aware matching, heuristics, and weighted fusion.
//! - Uniqueness-verified relative XPath synthesis.
//! - The durable promotion store and the outcome feedback loop.
//!
//! Observability hooks: install a [`RetrieverMetrics`] recorder via
//! [`set_retriever_metrics`]; structured logs flow through `tracing`.

pub use canonical::{
    canonicalize, content_hash, dom_hash, frame_hash, page_signature, BoundingBox,
    CanonicalError, CanonicalizeConfig, Descriptor, Digest160, Digest256, RawElement,
    RawSnapshot, Snapshot, VolatileMatcher, DEFAULT_VOLATILE_PATTERNS,
};
pub use embed::{
    CacheConfig, CacheError, CancelToken, ColdStore, ElementEmbedder, EmbeddingCache,
    ProviderConfig, ProviderError, QueryEmbedder, Reranker, StubElementEmbedder,
    StubQueryEmbedder, StubReranker,
};
pub use findex::{FrameIndex, IndexConfig, IndexEntry, IndexMode, SessionIndexes};
pub use intent::{label_key, label_tokens, parse as parse_intent, Action, Intent, IntentError};
pub use matcher::{
    action_filter, heuristic_score, lexical_score, MatchConfig, MatchError,
};
pub use promotion::{Promotion, PromotionError, PromotionKey, PromotionStore};
pub use retriever::{
    set_retriever_metrics, DegradedReason, Engine, EngineConfig, NearMiss, RetrieveError,
    RetrieveResult, RetrieverMetrics, Session, Status,
};
pub use synth::{ensure_relative, evaluate, synthesize, Strategy, SynthError, Synthesized};
