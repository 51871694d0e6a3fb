//! The immutable snapshot: every canonical descriptor of one capture plus
//! page-level identities and topology lookup tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::descriptor::Descriptor;
use crate::hash::{Digest160, Digest256};

/// The complete set of descriptors captured at a point in time.
///
/// Snapshots are value objects like the descriptors they own: built once by
/// [`canonicalize`](crate::canonicalize), never mutated afterwards. The
/// lookup tables are derived from the descriptor list at construction so
/// topology queries stay O(1) on the retrieval hot path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Descriptors in document order.
    pub descriptors: Vec<Descriptor>,
    /// Identity of the logical page: `(origin, normalized_path, dom_skeleton)`.
    pub page_signature: Digest160,
    /// SHA-256 over every `content_hash` in document order.
    pub dom_hash: Digest256,

    #[serde(skip)]
    by_backend_id: HashMap<u64, usize>,
    #[serde(skip)]
    children: HashMap<u64, Vec<u64>>,
}

impl Snapshot {
    pub(crate) fn new(
        descriptors: Vec<Descriptor>,
        page_signature: Digest160,
        dom_hash: Digest256,
    ) -> Self {
        let mut by_backend_id = HashMap::with_capacity(descriptors.len());
        let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            by_backend_id.insert(descriptor.backend_id, index);
            if let Some(parent) = descriptor.parent_id {
                children.entry(parent).or_default().push(descriptor.backend_id);
            }
        }
        Self {
            descriptors,
            page_signature,
            dom_hash,
            by_backend_id,
            children,
        }
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor by backend id.
    pub fn get(&self, backend_id: u64) -> Option<&Descriptor> {
        self.by_backend_id
            .get(&backend_id)
            .map(|&index| &self.descriptors[index])
    }

    /// Document-order position of a backend id.
    pub fn doc_order(&self, backend_id: u64) -> Option<usize> {
        self.by_backend_id.get(&backend_id).copied()
    }

    /// The element's parent descriptor, when it has one in this snapshot.
    pub fn parent_of(&self, backend_id: u64) -> Option<&Descriptor> {
        self.get(backend_id)
            .and_then(|d| d.parent_id)
            .and_then(|parent| self.get(parent))
    }

    /// Backend ids of the element's children, in document order.
    pub fn children_of(&self, backend_id: u64) -> &[u64] {
        self.children
            .get(&backend_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sibling descriptors (same parent, element itself excluded), in
    /// document order.
    pub fn siblings_of(&self, backend_id: u64) -> Vec<&Descriptor> {
        let Some(parent) = self.get(backend_id).and_then(|d| d.parent_id) else {
            return Vec::new();
        };
        self.children_of(parent)
            .iter()
            .filter(|&&id| id != backend_id)
            .filter_map(|&id| self.get(id))
            .collect()
    }

    /// Unique frame hashes in first-seen document order.
    pub fn frame_hashes(&self) -> Vec<Digest160> {
        let mut seen = Vec::new();
        for descriptor in &self.descriptors {
            if !seen.contains(&descriptor.frame_hash) {
                seen.push(descriptor.frame_hash);
            }
        }
        seen
    }

    /// Descriptors belonging to one frame, in document order.
    pub fn frame_members(&self, frame: Digest160) -> Vec<&Descriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.frame_hash == frame)
            .collect()
    }

    /// Rebuild the skipped lookup tables after deserialization.
    pub fn rebuild_tables(self) -> Self {
        Self::new(self.descriptors, self.page_signature, self.dom_hash)
    }
}
