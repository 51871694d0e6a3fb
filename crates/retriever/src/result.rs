use serde::{Deserialize, Serialize};

use findex::IndexMode;

/// Terminal status of one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// A verified selector was produced with every axis available.
    Success,
    /// No candidate cleared the confidence floor.
    ElementNotFound,
    /// A winner was selected but no strategy produced a unique selector.
    SynthesisFailed,
    /// A verified selector was produced, but with one or more axes
    /// disabled (see `degraded_reasons`).
    Degraded,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::ElementNotFound => "element_not_found",
            Status::SynthesisFailed => "synthesis_failed",
            Status::Degraded => "degraded",
        }
    }

    /// Whether the result carries a usable selector.
    pub fn has_selector(&self) -> bool {
        matches!(self, Status::Success | Status::Degraded)
    }
}

/// Why an axis or tier was unavailable during the retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    EmbeddingTimeout,
    RerankTimeout,
    CacheDiskUnavailable,
    PromotionStoreUnavailable,
}

impl DegradedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradedReason::EmbeddingTimeout => "embedding_timeout",
            DegradedReason::RerankTimeout => "rerank_timeout",
            DegradedReason::CacheDiskUnavailable => "cache_disk_unavailable",
            DegradedReason::PromotionStoreUnavailable => "promotion_store_unavailable",
        }
    }
}

/// A runner-up carried for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearMiss {
    /// Best-effort selector; empty when no strategy verified for it.
    pub xpath: String,
    pub confidence: f32,
    pub reasons: Vec<String>,
}

/// The strict, never-null result of `retrieve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResult {
    pub status: Status,
    /// Relative XPath; empty only when `status` carries no selector.
    pub xpath: String,
    /// Fused confidence of the selected candidate, in [0, 1].
    pub confidence: f32,
    /// Selector strategy name; empty when no selector was produced.
    pub strategy: String,
    /// Frame path of the selected element (empty for the root frame or
    /// when nothing was selected).
    pub frame_path: Vec<String>,
    /// Up to three runners-up with reasons.
    pub near_misses: Vec<NearMiss>,
    /// Aggregated index-reuse mode of this retrieval.
    pub mode: IndexMode,
    pub degraded_reasons: Vec<DegradedReason>,
}

impl RetrieveResult {
    pub(crate) fn miss(
        status: Status,
        mode: IndexMode,
        near_misses: Vec<NearMiss>,
        degraded_reasons: Vec<DegradedReason>,
    ) -> Self {
        Self {
            status,
            xpath: String::new(),
            confidence: 0.0,
            strategy: String::new(),
            frame_path: Vec::new(),
            near_misses,
            mode,
            degraded_reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_are_wire_stable() {
        assert_eq!(Status::Success.as_str(), "success");
        assert_eq!(Status::ElementNotFound.as_str(), "element_not_found");
        assert_eq!(Status::SynthesisFailed.as_str(), "synthesis_failed");
        assert_eq!(Status::Degraded.as_str(), "degraded");
    }

    #[test]
    fn selector_presence_follows_status() {
        assert!(Status::Success.has_selector());
        assert!(Status::Degraded.has_selector());
        assert!(!Status::ElementNotFound.has_selector());
        assert!(!Status::SynthesisFailed.has_selector());
    }

    #[test]
    fn reason_names_are_wire_stable() {
        assert_eq!(DegradedReason::EmbeddingTimeout.as_str(), "embedding_timeout");
        assert_eq!(
            DegradedReason::CacheDiskUnavailable.as_str(),
            "cache_disk_unavailable"
        );
    }
}
