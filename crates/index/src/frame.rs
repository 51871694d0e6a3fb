use hnsw_rs::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use canonical::Digest160;

/// Tuning for one frame's vector index.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Neighbors per HNSW node.
    pub m: usize,
    /// Candidate-list size during graph construction.
    pub ef_construction: usize,
    /// Candidate-list size during graph search.
    pub ef_search: usize,
    /// Below this many vectors the brute-force scan is used even when the
    /// graph is enabled; exact and faster at small sizes.
    pub min_vectors_for_ann: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            min_vectors_for_ann: 1000,
        }
    }
}

/// Error type for frame-index operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// One search result: element and its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub backend_id: u64,
    /// Cosine similarity clamped into [0, 1].
    pub score: f32,
}

struct Entry {
    backend_id: u64,
    content_hash: Digest160,
    doc_order: usize,
    vector: Arc<Vec<f32>>,
}

/// Top-k cosine index over the element vectors of one frame.
pub struct FrameIndex {
    config: IndexConfig,
    dim: usize,
    entries: Vec<Entry>,
    slot_of: HashMap<u64, usize>,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
    graph_dirty: bool,
}

impl FrameIndex {
    pub fn new(dim: usize, config: IndexConfig) -> Self {
        Self {
            config,
            dim,
            entries: Vec::new(),
            slot_of: HashMap::new(),
            hnsw: None,
            graph_dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Insert or replace the vector for one element.
    pub fn insert(
        &mut self,
        backend_id: u64,
        content_hash: Digest160,
        doc_order: usize,
        vector: Arc<Vec<f32>>,
    ) -> Result<(), IndexError> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }
        let entry = Entry {
            backend_id,
            content_hash,
            doc_order,
            vector,
        };
        match self.slot_of.get(&backend_id) {
            Some(&slot) => self.entries[slot] = entry,
            None => {
                self.slot_of.insert(backend_id, self.entries.len());
                self.entries.push(entry);
            }
        }
        self.graph_dirty = true;
        Ok(())
    }

    /// Remove one element; no-op when absent.
    pub fn remove(&mut self, backend_id: u64) {
        let Some(slot) = self.slot_of.remove(&backend_id) else {
            return;
        };
        self.entries.swap_remove(slot);
        if let Some(moved) = self.entries.get(slot) {
            self.slot_of.insert(moved.backend_id, slot);
        }
        self.graph_dirty = true;
    }

    /// Refresh an element's document-order position after a delta.
    pub fn set_doc_order(&mut self, backend_id: u64, doc_order: usize) {
        if let Some(&slot) = self.slot_of.get(&backend_id) {
            self.entries[slot].doc_order = doc_order;
        }
    }

    pub fn contains(&self, backend_id: u64) -> bool {
        self.slot_of.contains_key(&backend_id)
    }

    /// Whether every id is present; the warm-reuse test.
    pub fn contains_all(&self, backend_ids: &[u64]) -> bool {
        backend_ids.iter().all(|id| self.slot_of.contains_key(id))
    }

    /// Content hash currently indexed for an element.
    pub fn content_hash_of(&self, backend_id: u64) -> Option<Digest160> {
        self.slot_of
            .get(&backend_id)
            .map(|&slot| self.entries[slot].content_hash)
    }

    /// Shared handle to the indexed vector for an element.
    pub fn vector_of(&self, backend_id: u64) -> Option<Arc<Vec<f32>>> {
        self.slot_of
            .get(&backend_id)
            .map(|&slot| self.entries[slot].vector.clone())
    }

    /// Ids currently indexed, in no particular order.
    pub fn indexed_ids(&self) -> Vec<u64> {
        self.slot_of.keys().copied().collect()
    }

    /// Cosine top-k. Ties break toward earlier document order; the result
    /// is deterministic for a fixed index state.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize, u64)> =
            if self.entries.len() >= self.config.min_vectors_for_ann {
                self.graph_search(query, k)
            } else {
                self.linear_search(query)
            };

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(score, _, backend_id)| SearchHit {
                backend_id,
                score: score.clamp(0.0, 1.0),
            })
            .collect())
    }

    /// Build or refresh the HNSW graph when the frame is large enough.
    /// Cheap to call; does nothing while the brute-force path is active.
    pub fn ensure_graph(&mut self) {
        if self.entries.len() < self.config.min_vectors_for_ann || !self.graph_dirty {
            return;
        }
        let nb_elem = self.entries.len();
        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            nb_elem,
            nb_layer,
            self.config.ef_construction,
            DistCosine {},
        );
        let data: Vec<(&Vec<f32>, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (entry.vector.as_ref(), slot))
            .collect();
        hnsw.parallel_insert(&data);
        self.hnsw = Some(hnsw);
        self.graph_dirty = false;
    }

    fn linear_search(&self, query: &[f32]) -> Vec<(f32, usize, u64)> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    cosine_similarity(query, &entry.vector),
                    entry.doc_order,
                    entry.backend_id,
                )
            })
            .collect()
    }

    fn graph_search(&self, query: &[f32], k: usize) -> Vec<(f32, usize, u64)> {
        let Some(hnsw) = self.hnsw.as_ref().filter(|_| !self.graph_dirty) else {
            // Graph stale or absent: fall back to the exact scan.
            return self.linear_search(query);
        };
        let neighbours: Vec<Neighbour> = hnsw.search(query, k, self.config.ef_search);
        neighbours
            .into_iter()
            .filter_map(|n| self.entries.get(n.get_origin_id()))
            .map(|entry| {
                (
                    cosine_similarity(query, &entry.vector),
                    entry.doc_order,
                    entry.backend_id,
                )
            })
            .collect()
    }
}

/// Cosine similarity; zero-norm inputs score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(seed: u8) -> Digest160 {
        Digest160([seed; 20])
    }

    fn index_with(vectors: &[(u64, Vec<f32>)]) -> FrameIndex {
        let mut index = FrameIndex::new(3, IndexConfig::default());
        for (order, (id, vector)) in vectors.iter().enumerate() {
            index
                .insert(*id, digest(*id as u8), order, Arc::new(vector.clone()))
                .unwrap();
        }
        index
    }

    #[test]
    fn top_k_orders_by_similarity() {
        let index = index_with(&[
            (1, vec![1.0, 0.0, 0.0]),
            (2, vec![0.0, 1.0, 0.0]),
            (3, vec![0.9, 0.1, 0.0]),
        ]);
        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].backend_id, 1);
        assert_eq!(hits[1].backend_id, 3);
    }

    #[test]
    fn ties_break_by_document_order() {
        let index = index_with(&[
            (5, vec![1.0, 0.0, 0.0]),
            (2, vec![1.0, 0.0, 0.0]),
            (9, vec![1.0, 0.0, 0.0]),
        ]);
        let hits = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
        // Insertion order above is document order: 5, then 2, then 9.
        let ids: Vec<u64> = hits.iter().map(|h| h.backend_id).collect();
        assert_eq!(ids, vec![5, 2, 9]);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = FrameIndex::new(3, IndexConfig::default());
        assert_eq!(
            index.insert(1, digest(1), 0, Arc::new(vec![1.0])),
            Err(IndexError::DimensionMismatch { expected: 3, got: 1 })
        );
        let index = index_with(&[(1, vec![1.0, 0.0, 0.0])]);
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn remove_keeps_search_consistent() {
        let mut index = index_with(&[
            (1, vec![1.0, 0.0, 0.0]),
            (2, vec![0.0, 1.0, 0.0]),
            (3, vec![0.0, 0.0, 1.0]),
        ]);
        index.remove(1);
        assert!(!index.contains(1));
        assert_eq!(index.len(), 2);
        let hits = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
        assert!(hits.iter().all(|h| h.backend_id != 1));
    }

    #[test]
    fn reinsert_replaces_vector() {
        let mut index = index_with(&[(1, vec![1.0, 0.0, 0.0])]);
        index
            .insert(1, digest(7), 0, Arc::new(vec![0.0, 1.0, 0.0]))
            .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.content_hash_of(1), Some(digest(7)));
        let hits = index.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn contains_all_detects_missing_ids() {
        let index = index_with(&[(1, vec![1.0, 0.0, 0.0]), (2, vec![0.0, 1.0, 0.0])]);
        assert!(index.contains_all(&[1, 2]));
        assert!(!index.contains_all(&[1, 2, 3]));
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = FrameIndex::new(3, IndexConfig::default());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn graph_path_matches_linear_results_on_top_hit() {
        let config = IndexConfig {
            min_vectors_for_ann: 10,
            ..Default::default()
        };
        let mut index = FrameIndex::new(3, config);
        for i in 0..50u64 {
            let angle = i as f32 * 0.1;
            index
                .insert(
                    i,
                    digest(i as u8),
                    i as usize,
                    Arc::new(vec![angle.cos(), angle.sin(), 0.0]),
                )
                .unwrap();
        }
        index.ensure_graph();
        let hits = index.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].backend_id, 0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let index = index_with(&[(1, vec![0.0, 0.0, 0.0])]);
        let hits = index.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].score, 0.0);
    }
}
