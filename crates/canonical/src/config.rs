//! Configuration for snapshot canonicalization.
//!
//! # Versioning
//!
//! The `version` field participates in every hash the pipeline computes.
//! Any change to canonicalization behavior (even a bug fix) must be
//! accompanied by a version bump so that:
//!
//! - old cache rows keyed on `content_hash` are never reused for vectors
//!   produced under different normalization rules, and
//! - promotion rows scoped by `page_signature` age out instead of matching
//!   pages they no longer describe.
//!
//! # Volatile patterns
//!
//! The exact set of runtime-volatile attribute shapes differs between
//! front-end frameworks, so the list is configuration rather than code.
//! [`DEFAULT_VOLATILE_PATTERNS`](crate::DEFAULT_VOLATILE_PATTERNS) documents
//! the defaults; tests are parameterized on the list.

use serde::{Deserialize, Serialize};

use crate::error::CanonicalError;
use crate::volatile::DEFAULT_VOLATILE_PATTERNS;

/// Configuration for the canonicalization pipeline.
///
/// Cheap to clone and serde-friendly so it can be embedded in a consolidated
/// engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalizeConfig {
    /// Semantic version of the canonicalization behavior. Must be >= 1;
    /// version 0 is reserved and rejected by [`validate`](Self::validate).
    pub version: u32,

    /// Regex patterns identifying runtime-volatile attribute values and
    /// keys. Matching attributes are excluded from every hash input and
    /// disqualify selector strategies that would anchor on them.
    #[serde(default = "CanonicalizeConfig::default_volatile_patterns")]
    pub volatile_patterns: Vec<String>,

    /// Maximum number of characters kept in `Descriptor::text`. The
    /// untruncated original survives in `raw_text`, which never feeds a hash.
    #[serde(default = "CanonicalizeConfig::default_text_cap")]
    pub text_cap: usize,

    /// Maximum number of characters per neighbor fragment when rendering
    /// re-ranker context windows.
    #[serde(default = "CanonicalizeConfig::default_context_cap")]
    pub context_cap: usize,
}

impl CanonicalizeConfig {
    pub(crate) fn default_volatile_patterns() -> Vec<String> {
        DEFAULT_VOLATILE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    pub(crate) fn default_text_cap() -> usize {
        512
    }

    pub(crate) fn default_context_cap() -> usize {
        256
    }

    /// Replace the volatile pattern list.
    pub fn with_volatile_patterns(mut self, patterns: Vec<String>) -> Self {
        self.volatile_patterns = patterns;
        self
    }

    /// Replace the visible-text cap.
    pub fn with_text_cap(mut self, cap: usize) -> Self {
        self.text_cap = cap;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CanonicalError> {
        if self.version == 0 {
            return Err(CanonicalError::InvalidConfig(
                "version must be >= 1 (0 is reserved)".into(),
            ));
        }
        if self.text_cap == 0 {
            return Err(CanonicalError::InvalidConfig(
                "text_cap must be non-zero".into(),
            ));
        }
        if self.context_cap == 0 {
            return Err(CanonicalError::InvalidConfig(
                "context_cap must be non-zero".into(),
            ));
        }
        for pattern in &self.volatile_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(CanonicalError::InvalidConfig(format!(
                    "volatile pattern `{pattern}` does not compile: {e}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for CanonicalizeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            volatile_patterns: Self::default_volatile_patterns(),
            text_cap: Self::default_text_cap(),
            context_cap: Self::default_context_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CanonicalizeConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.text_cap, 512);
        assert_eq!(config.context_cap, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn version_zero_is_rejected() {
        let config = CanonicalizeConfig {
            version: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CanonicalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bad_volatile_pattern_is_rejected() {
        let config =
            CanonicalizeConfig::default().with_volatile_patterns(vec!["[unclosed".into()]);
        assert!(matches!(
            config.validate(),
            Err(CanonicalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn serde_roundtrip() {
        let config = CanonicalizeConfig::default().with_text_cap(128);
        let json = serde_json::to_string(&config).unwrap();
        let back: CanonicalizeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
