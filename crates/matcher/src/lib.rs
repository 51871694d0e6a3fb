//! # Selectron Matcher
//!
//! The intent-aware scoring layers between the vector index and the
//! selector synthesizer:
//!
//! - **Hard filters** ([`action_filter`]) cut the snapshot down to the
//!   elements an action can address at all.
//! - **Lexical short path** ([`lexical_score`]) matches the quoted target
//!   against the element's text-bearing fields; a single exact match lets
//!   the orchestrator skip the semantic stage entirely.
//! - **Heuristics** ([`heuristic_score`]) add deterministic structural and
//!   accessibility bonuses and penalties. Every tuning constant lives in
//!   one module.
//! - **Fusion** ([`rank`]) combines the semantic, heuristic, and promotion
//!   axes with fixed weights, normalizes after summation, and breaks ties
//!   by document order, then frame depth.

mod config;
mod error;
mod filter;
mod fusion;
mod heuristics;
mod lexical;

pub use config::MatchConfig;
pub use error::MatchError;
pub use filter::action_filter;
pub use fusion::{rank, AxisScores, Candidate, ScoredItem};
pub use heuristics::{heuristic_score, weights};
pub use lexical::{lexical_score, LexicalHit};
