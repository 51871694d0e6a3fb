//! # Selectron Retriever
//!
//! The top-level coordinator. One [`Engine`] owns the process-shared state
//! (embedding cache, promotion store, provider handles, configuration);
//! each [`Session`] owns its per-frame indexes and runs one query at a
//! time through the pipeline states:
//!
//! ```text
//! Idle → Canonicalizing → Indexing → Matching → Synthesizing → Verifying
//!      → Reporting → Idle
//! ```
//!
//! Control flow highlights:
//!
//! - A stored promotion that still uniquely resolves short-circuits the
//!   whole pipeline (`strategy = promoted`, no provider calls).
//! - Provider failures degrade, never abort: a lost embedding axis zeroes
//!   the semantic scores, a lost re-ranker falls back to shortlist order,
//!   and the reasons ride along in the result metadata.
//! - An unverifiable winner is demoted by 0.5 and selection retries once;
//!   after that the call reports `synthesis_failed`.
//! - Cold-tier cache writes buffer during the query and commit in one
//!   batch only when the query terminates successfully.
//! - Cancellation is checked between states, and in-flight provider calls
//!   race the token.

mod config;
mod engine;
mod error;
mod metrics;
mod result;

pub use config::EngineConfig;
pub use embed::CancelToken;
pub use engine::{Engine, Session};
pub use error::RetrieveError;
pub use metrics::{set_retriever_metrics, RetrieverMetrics};
pub use result::{DegradedReason, NearMiss, RetrieveResult, Status};
