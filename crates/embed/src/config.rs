use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CacheError;

/// Tuning for the two-tier embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Hot-tier capacity, in entries, across all shards.
    #[serde(default = "CacheConfig::default_hot_capacity")]
    pub hot_capacity: usize,
    /// Number of hot-tier shards. Sixteen keeps parallel sessions off each
    /// other's locks without oversizing the per-shard LRU bookkeeping.
    #[serde(default = "CacheConfig::default_shards")]
    pub shards: usize,
    /// Cold-tier file path; `None` runs the cache hot-only.
    #[serde(default)]
    pub cold_path: Option<PathBuf>,
    /// Cold-tier row budget per model; approximate-LRU eviction beyond it.
    #[serde(default = "CacheConfig::default_cold_row_budget")]
    pub cold_row_budget: usize,
}

impl CacheConfig {
    pub(crate) fn default_hot_capacity() -> usize {
        8192
    }

    pub(crate) fn default_shards() -> usize {
        16
    }

    pub(crate) fn default_cold_row_budget() -> usize {
        100_000
    }

    /// Hot-only configuration for tests and ephemeral sessions.
    pub fn in_memory() -> Self {
        Self {
            cold_path: None,
            ..Default::default()
        }
    }

    pub fn with_cold_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cold_path = Some(path.into());
        self
    }

    pub fn with_hot_capacity(mut self, capacity: usize) -> Self {
        self.hot_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.hot_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "hot_capacity must be non-zero".into(),
            ));
        }
        if self.shards == 0 {
            return Err(CacheError::InvalidConfig("shards must be non-zero".into()));
        }
        if self.cold_row_budget == 0 {
            return Err(CacheError::InvalidConfig(
                "cold_row_budget must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_capacity: Self::default_hot_capacity(),
            shards: Self::default_shards(),
            cold_path: None,
            cold_row_budget: Self::default_cold_row_budget(),
        }
    }
}

/// Deadlines for provider calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Per-call deadline for query and element embedding, milliseconds.
    #[serde(default = "ProviderConfig::default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,
    /// Per-call deadline for re-rank scoring, milliseconds.
    #[serde(default = "ProviderConfig::default_rerank_timeout_ms")]
    pub rerank_timeout_ms: u64,
}

impl ProviderConfig {
    pub(crate) fn default_embed_timeout_ms() -> u64 {
        2000
    }

    pub(crate) fn default_rerank_timeout_ms() -> u64 {
        2000
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            embed_timeout_ms: Self::default_embed_timeout_ms(),
            rerank_timeout_ms: Self::default_rerank_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CacheConfig::default().validate().is_ok());
        let providers = ProviderConfig::default();
        assert_eq!(providers.embed_timeout_ms, 2000);
        assert_eq!(providers.rerank_timeout_ms, 2000);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = CacheConfig {
            hot_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_shards_rejected() {
        let config = CacheConfig {
            shards: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
