//! # Selectron Synth
//!
//! Relative XPath synthesis for a chosen descriptor, with uniqueness
//! verified against the snapshot before a selector is ever returned.
//!
//! ## Contract
//!
//! Every produced XPath begins with `//` and never references `/html` or
//! `/body`. Strategies are attempted in a fixed order — id, test id,
//! aria-label, name, exact text, stable class token, combined attributes,
//! hierarchical anchor, positional fallback — and the first one whose
//! selector resolves to exactly the chosen element within its frame wins.
//! A strategy failing uniqueness is not an error; running out of
//! strategies is.
//!
//! ## Verification
//!
//! [`evaluate`] interprets the restricted XPath grammar the synthesizer
//! emits (attribute equality, `normalize-space()`, `contains(@class, …)`,
//! conjunctive predicates, descendant chaining, a positional suffix)
//! directly against the snapshot. That keeps re-checking a promoted
//! selector from a past session browser-free and deterministic.

mod error;
mod strategy;
mod xpath;

pub use error::SynthError;
pub use strategy::{synthesize, Strategy, Synthesized};
pub use xpath::{ensure_relative, evaluate, resolves_uniquely_to};
