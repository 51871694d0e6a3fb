//! # Selectron Promotion
//!
//! The durable memory of the retrieval core: selectors that actually worked,
//! keyed by `(page_signature, frame_hash, label_key)` and scored with
//! success/failure counters.
//!
//! A promoted selector that still uniquely resolves lets the orchestrator
//! skip the whole scoring pipeline; one that keeps failing is demoted —
//! excluded from the boost but retained for diagnostics. Rows age out by
//! approximate LRU once the store exceeds its row budget. The store must
//! survive process restarts, so it lives in redb with the same
//! single-writer many-reader discipline as the cold vector tier.

mod store;

pub use store::{Promotion, PromotionError, PromotionKey, PromotionStore, DEMOTION_MARGIN};
