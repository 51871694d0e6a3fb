//! # Selectron Intent
//!
//! Parsed instruction records and the small grammar the retrieval core
//! accepts. An instruction is one English sentence whose action token is
//! free-form (`Click`, `Press`, `Fill in`, ...), whose target is a
//! double-quoted string, and whose typed value (for `type` actions) is a
//! `$`-prefixed quoted string:
//!
//! ```text
//! Click "Sign in"
//! Type $"john@example.com" into "Email"
//! Select "Blue" in "Color"
//! Validate "Welcome back"
//! ```
//!
//! The parser fills the [`Intent`] record the orchestrator consumes; the
//! [`label_key`] digest over the normalized target tokens scopes promotion
//! rows and drives the id-match heuristic.

mod label;
mod parse;
mod types;

pub use label::{label_key, label_tokens, STOP_WORDS};
pub use parse::parse;
pub use types::{Action, Intent, IntentError};
