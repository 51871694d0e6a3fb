use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use canonical::CanonicalizeConfig;
use embed::{CacheConfig, ProviderConfig};
use findex::IndexConfig;
use matcher::MatchConfig;

use crate::error::RetrieveError;

/// The consolidated engine configuration: every member crate's tuning
/// record in one serde-friendly value, loaded once per engine. Absent
/// fields fall back to the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub canonical: CanonicalizeConfig,
    #[serde(default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub index: IndexConfig,
    /// Promotion store file; `None` keeps promotions in memory (they then
    /// do not survive the process).
    #[serde(default)]
    pub promotion_path: Option<PathBuf>,
    #[serde(default = "EngineConfig::default_promotion_row_budget")]
    pub promotion_row_budget: usize,
}

impl EngineConfig {
    pub(crate) fn default_promotion_row_budget() -> usize {
        50_000
    }

    /// In-memory everything; the configuration integration tests use.
    pub fn in_memory() -> Self {
        Self {
            cache: CacheConfig::in_memory(),
            promotion_path: None,
            ..Default::default()
        }
    }

    pub fn with_promotion_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.promotion_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<(), RetrieveError> {
        self.canonical
            .validate()
            .map_err(|e| RetrieveError::Config(e.to_string()))?;
        self.matching
            .validate()
            .map_err(|e| RetrieveError::Config(e.to_string()))?;
        self.cache
            .validate()
            .map_err(|e| RetrieveError::Config(e.to_string()))?;
        if self.promotion_row_budget == 0 {
            return Err(RetrieveError::Config(
                "promotion_row_budget must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canonical: CanonicalizeConfig::default(),
            matching: MatchConfig::default(),
            cache: CacheConfig::default(),
            providers: ProviderConfig::default(),
            index: IndexConfig::default(),
            promotion_path: None,
            promotion_row_budget: Self::default_promotion_row_budget(),
        }
    }
}
