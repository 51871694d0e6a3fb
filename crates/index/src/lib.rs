//! # Selectron Index
//!
//! In-memory top-k cosine search over the element vectors of one frame,
//! plus the session bookkeeping that decides how much of a previous
//! snapshot's index can be reused.
//!
//! Each frame (keyed by its `frame_hash`) gets its own [`FrameIndex`]. The
//! index is owned by a session and mutated synchronously within it; there
//! is no cross-session sharing and therefore no locking here.
//!
//! Small frames are searched brute-force; past a configurable threshold an
//! HNSW graph takes over (the same switch the reference index layer uses:
//! linear scan is exact and plenty fast below a few thousand vectors, the
//! graph wins above). Search ties are broken by document order so results
//! are deterministic for equal scores.
//!
//! [`SessionIndexes`] implements the reuse policy:
//!
//! - **Cold** — no index for this `frame_hash` yet: embed and insert all.
//! - **Warm** — the current element set is a subset of the indexed one:
//!   reuse untouched.
//! - **Delta** — the sets differ: apply insertions and removals in place,
//!   falling back to a full rebuild only when more than half the frame
//!   changed.

mod frame;
mod session;

pub use frame::{FrameIndex, IndexConfig, IndexError, SearchHit};
pub use session::{DeltaPlan, IndexEntry, IndexMode, SessionIndexes};
