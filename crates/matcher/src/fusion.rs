//! Final score fusion and deterministic ranking.
//!
//! `fused = (α · text + β · heuristic + γ · promotion) / (α + β + γ)`,
//! clamped into [0, 1] after the division — normalization happens after
//! summation, never per axis. The text term is the stronger of the model
//! score and the lexical score, so an exact quoted match keeps deciding
//! even when the embedding axis is degraded to zero.
//!
//! Ties break by document order within the frame, then by shallower frame
//! path, which makes ranking a total deterministic order.

use serde::{Deserialize, Serialize};

use crate::config::MatchConfig;

/// Per-axis scores for one candidate, before fusion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisScores {
    /// Model score: re-ranker output, or shortlist cosine when the
    /// re-ranker is unavailable, or 0.0 when the whole axis is degraded.
    pub semantic: f32,
    /// Lexical exact/partial match score (1.0 / 0.6 / 0.0).
    pub lexical: f32,
    /// Additive heuristic score; may be negative.
    pub heuristic: f32,
    /// Promotion boost in [0, 1].
    pub promotion: f32,
}

/// One candidate entering fusion.
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub backend_id: u64,
    pub axes: AxisScores,
    /// Rule names and notes that explain the scores.
    pub reasons: Vec<String>,
    pub doc_order: usize,
    pub frame_depth: usize,
}

/// A ranked candidate after fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub backend_id: u64,
    /// Normalized fused score in [0, 1].
    pub fused: f32,
    pub axes: AxisScores,
    pub reasons: Vec<String>,
    pub doc_order: usize,
    pub frame_depth: usize,
}

/// Fuse and rank; the caller applies the τ floor to the winner.
pub fn rank(config: &MatchConfig, items: Vec<ScoredItem>) -> Vec<Candidate> {
    let weight_sum = config.alpha + config.beta + config.gamma;
    let mut candidates: Vec<Candidate> = items
        .into_iter()
        .map(|item| {
            let text_axis = item.axes.semantic.max(item.axes.lexical);
            let raw = config.alpha * text_axis
                + config.beta * item.axes.heuristic
                + config.gamma * item.axes.promotion;
            Candidate {
                backend_id: item.backend_id,
                fused: (raw / weight_sum).clamp(0.0, 1.0),
                axes: item.axes,
                reasons: item.reasons,
                doc_order: item.doc_order,
                frame_depth: item.frame_depth,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.fused
            .partial_cmp(&a.fused)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.doc_order.cmp(&b.doc_order))
            .then(a.frame_depth.cmp(&b.frame_depth))
    });
    candidates
}
