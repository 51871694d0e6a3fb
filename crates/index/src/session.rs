//! Session-owned index set and the cold/warm/delta reuse policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use canonical::Digest160;

use crate::frame::{FrameIndex, IndexConfig, IndexError};

/// How the index for one frame was obtained this retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// No prior index existed; everything was embedded and inserted.
    Cold,
    /// The prior index covered the current element set; reused untouched.
    Warm,
    /// The prior index was updated in place (or rebuilt past the 50%
    /// threshold) with only the changed elements embedded.
    Delta,
}

impl IndexMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexMode::Cold => "cold",
            IndexMode::Warm => "warm",
            IndexMode::Delta => "delta",
        }
    }
}

/// One element the caller wants indexed: identity plus document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub backend_id: u64,
    pub content_hash: Digest160,
    pub doc_order: usize,
}

/// The work a delta requires, as computed by [`SessionIndexes::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaPlan {
    pub mode: IndexMode,
    /// Elements whose vectors are needed (all of them on cold; only the
    /// changed ones on delta; empty on warm).
    pub to_embed: Vec<IndexEntry>,
    /// Ids to drop from the prior index (delta only).
    pub to_remove: Vec<u64>,
    /// Delta exceeded half the frame: drop the prior index and treat the
    /// application as a full rebuild.
    pub rebuild: bool,
}

/// The per-session collection of frame indexes.
///
/// Owned by exactly one session; no interior locking. Rebuilds and delta
/// application are synchronous within the session's query.
pub struct SessionIndexes {
    config: IndexConfig,
    dim: usize,
    frames: HashMap<Digest160, FrameIndex>,
}

impl SessionIndexes {
    pub fn new(dim: usize, config: IndexConfig) -> Self {
        Self {
            config,
            dim,
            frames: HashMap::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Compare the current element set of a frame against what is indexed
    /// and produce the reuse plan.
    ///
    /// An element counts as changed (removed + added) when its id survives
    /// but its content hash moved; reusing the old vector for new content
    /// would violate the content-addressing contract.
    pub fn plan(&self, frame: Digest160, current: &[IndexEntry]) -> DeltaPlan {
        let Some(index) = self.frames.get(&frame) else {
            return DeltaPlan {
                mode: IndexMode::Cold,
                to_embed: current.to_vec(),
                to_remove: Vec::new(),
                rebuild: false,
            };
        };

        let mut to_embed = Vec::new();
        for entry in current {
            match index.content_hash_of(entry.backend_id) {
                Some(indexed) if indexed == entry.content_hash => {}
                _ => to_embed.push(*entry),
            }
        }
        let current_ids: Vec<u64> = current.iter().map(|e| e.backend_id).collect();
        let to_remove: Vec<u64> = index
            .indexed_ids()
            .into_iter()
            .filter(|id| !current_ids.contains(id))
            .collect();

        if to_embed.is_empty() && to_remove.is_empty() {
            return DeltaPlan {
                mode: IndexMode::Warm,
                to_embed,
                to_remove,
                rebuild: false,
            };
        }

        let churn = to_embed.len() + to_remove.len();
        let rebuild = churn * 2 > current.len().max(index.len());
        DeltaPlan {
            mode: IndexMode::Delta,
            to_embed,
            to_remove,
            rebuild,
        }
    }

    /// Apply a plan with the vectors the caller fetched or computed.
    ///
    /// `vectors` must hold one vector per entry in `plan.to_embed`, in the
    /// same order. On warm plans this is a no-op beyond doc-order refresh.
    pub fn apply(
        &mut self,
        frame: Digest160,
        plan: &DeltaPlan,
        current: &[IndexEntry],
        vectors: &[Arc<Vec<f32>>],
    ) -> Result<(), IndexError> {
        if plan.rebuild {
            // Start fresh, carrying the surviving vectors over from the
            // old index so the caller only ever supplies `to_embed`.
            let old = self.frames.remove(&frame);
            let mut rebuilt = FrameIndex::new(self.dim, self.config);
            if let Some(old) = &old {
                for entry in current {
                    let unchanged = old.content_hash_of(entry.backend_id)
                        == Some(entry.content_hash);
                    if unchanged {
                        if let Some(vector) = old.vector_of(entry.backend_id) {
                            rebuilt.insert(
                                entry.backend_id,
                                entry.content_hash,
                                entry.doc_order,
                                vector,
                            )?;
                        }
                    }
                }
            }
            self.frames.insert(frame, rebuilt);
        } else if !self.frames.contains_key(&frame) {
            self.frames
                .insert(frame, FrameIndex::new(self.dim, self.config));
        }
        let index = self
            .frames
            .get_mut(&frame)
            .expect("frame index inserted above");

        if !plan.rebuild {
            for id in &plan.to_remove {
                index.remove(*id);
            }
        }
        for (entry, vector) in plan.to_embed.iter().zip(vectors.iter()) {
            index.insert(
                entry.backend_id,
                entry.content_hash,
                entry.doc_order,
                vector.clone(),
            )?;
        }
        // Document order can shift even for untouched elements.
        for entry in current {
            index.set_doc_order(entry.backend_id, entry.doc_order);
        }
        index.ensure_graph();
        debug!(
            frame = %frame,
            mode = plan.mode.as_str(),
            size = index.len(),
            "frame index applied"
        );
        Ok(())
    }

    pub fn frame(&self, frame: Digest160) -> Option<&FrameIndex> {
        self.frames.get(&frame)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
