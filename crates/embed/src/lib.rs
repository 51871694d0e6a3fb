//! # Selectron Embed
//!
//! The provider seams and the content-addressed vector cache.
//!
//! ## Providers
//!
//! The core never runs a model itself. It talks to three collaborator
//! traits — [`QueryEmbedder`], [`ElementEmbedder`], and [`Reranker`] —
//! through [`with_deadline`], which bounds every call (default 2000 ms) and
//! races it against the session's [`CancelToken`]. A deadline miss or an
//! aborted call is a recoverable [`ProviderError`]; the orchestrator
//! degrades the affected scoring axis instead of failing the retrieval.
//!
//! ## Cache
//!
//! [`EmbeddingCache`] is keyed by `(model_id, content_hash)`:
//!
//! - **Hot tier**: a 16-way sharded LRU in memory, sized in entries.
//! - **Cold tier**: a redb file using the `HEV1` record layout (per-model
//!   header with dimension and vector format; fixed-size rows of
//!   `version | float32-LE vector | last_used_ns`). Short rows, version
//!   mismatches, and unknown formats read as misses, never as errors.
//!
//! Any disk error flips the cache into hot-only mode for the rest of the
//! process; the degraded flag travels up into the retrieval result
//! metadata. A cache problem never fails a retrieval.

mod cache;
mod config;
mod error;
mod provider;
mod store;
mod stub;

pub use cache::EmbeddingCache;
pub use config::{CacheConfig, ProviderConfig};
pub use error::{CacheError, ProviderError};
pub use provider::{
    with_deadline, CancelToken, ElementEmbedder, QueryEmbedder, Reranker,
};
pub use store::ColdStore;
pub use stub::{stub_vector, StubElementEmbedder, StubQueryEmbedder, StubReranker};
