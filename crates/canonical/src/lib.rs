//! # Selectron Canonical
//!
//! This crate turns raw browser output (DOM records joined with accessibility
//! fields by `backend_id`) into canonical [`Descriptor`] values and an
//! immutable [`Snapshot`], the value objects the rest of the retrieval
//! pipeline operates on.
//!
//! ## Responsibilities
//!
//! - Normalize tags, roles, and visible text (whitespace collapse, length cap).
//! - Strip runtime-volatile attributes (autogenerated ids, framework fiber
//!   markers, ephemeral `aria-owns` suffixes) out of every hash input so
//!   content identity survives re-renders.
//! - Compute the identity hashes the caches and stores key on:
//!   `content_hash` per element, `frame_hash` per frame, `page_signature`
//!   per logical page, and `dom_hash` over the whole snapshot.
//! - Render canonical element fragments (and bounded context fragments) for
//!   the embedding and re-ranking providers.
//!
//! ## Determinism
//!
//! For a fixed [`CanonicalizeConfig`] version and raw input, every field of
//! the produced [`Snapshot`] is deterministic across machines and runs. The
//! config version participates in each hash, so a behavior change in the
//! canonicalizer can never silently reuse stale cache rows.
//!
//! ## Example
//!
//! ```rust
//! use canonical::{canonicalize, CanonicalizeConfig, RawElement, RawSnapshot};
//!
//! let raw = RawSnapshot {
//!     origin: "https://app.example.com".into(),
//!     path: "/login".into(),
//!     elements: vec![RawElement {
//!         backend_id: Some(1),
//!         tag: Some("BUTTON".into()),
//!         text: Some("  Sign   In  ".into()),
//!         ..Default::default()
//!     }],
//! };
//!
//! let snapshot = canonicalize(&raw, &CanonicalizeConfig::default()).unwrap();
//! assert_eq!(snapshot.descriptors[0].tag, "button");
//! assert_eq!(snapshot.descriptors[0].text, "Sign In");
//! ```

mod config;
mod descriptor;
mod error;
mod fragment;
mod hash;
mod pipeline;
mod snapshot;
mod volatile;

pub use config::CanonicalizeConfig;
pub use descriptor::{BoundingBox, Descriptor, RawElement, RawSnapshot};
pub use error::CanonicalError;
pub use fragment::{context_fragment, element_fragment};
pub use hash::{
    content_hash, dom_hash, frame_hash, frame_identity, label_digest, page_signature, Digest160,
    Digest256,
};
pub use pipeline::canonicalize;
pub use snapshot::Snapshot;
pub use volatile::{VolatileMatcher, DEFAULT_VOLATILE_PATTERNS};
