use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Per-engine matching knobs.
///
/// Cheap to clone and serde-friendly; absent fields fall back to the fixed
/// defaults below, which are also the documented contract values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Shortlist size pulled from the per-frame index.
    #[serde(default = "MatchConfig::default_top_k")]
    pub top_k: usize,
    /// Weight of the semantic/text axis.
    #[serde(default = "MatchConfig::default_alpha")]
    pub alpha: f32,
    /// Weight of the heuristic axis.
    #[serde(default = "MatchConfig::default_beta")]
    pub beta: f32,
    /// Weight of the promotion boost.
    #[serde(default = "MatchConfig::default_gamma")]
    pub gamma: f32,
    /// Confidence floor: the top candidate must clear this fused score or
    /// the retrieval reports `element_not_found`.
    #[serde(default = "MatchConfig::default_tau")]
    pub tau: f32,
    /// How many near-misses to carry in failure diagnostics.
    #[serde(default = "MatchConfig::default_near_misses")]
    pub near_misses: usize,
}

impl MatchConfig {
    pub(crate) fn default_top_k() -> usize {
        32
    }

    pub(crate) fn default_alpha() -> f32 {
        1.0
    }

    pub(crate) fn default_beta() -> f32 {
        0.5
    }

    pub(crate) fn default_gamma() -> f32 {
        0.2
    }

    pub(crate) fn default_tau() -> f32 {
        0.25
    }

    pub(crate) fn default_near_misses() -> usize {
        3
    }

    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Validate weights and thresholds.
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.top_k == 0 {
            return Err(MatchError::InvalidConfig("top_k must be non-zero".into()));
        }
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta), ("gamma", self.gamma)]
        {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }
        if self.alpha + self.beta + self.gamma <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "at least one fusion weight must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return Err(MatchError::InvalidConfig(format!(
                "tau must lie in [0, 1], got {}",
                self.tau
            )));
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            top_k: Self::default_top_k(),
            alpha: Self::default_alpha(),
            beta: Self::default_beta(),
            gamma: Self::default_gamma(),
            tau: Self::default_tau(),
            near_misses: Self::default_near_misses(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = MatchConfig::default();
        assert_eq!(config.top_k, 32);
        assert_eq!(config.alpha, 1.0);
        assert_eq!(config.beta, 0.5);
        assert_eq!(config.gamma, 0.2);
        assert_eq!(config.tau, 0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let config = MatchConfig {
            alpha: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tau_out_of_range_is_rejected() {
        let config = MatchConfig::default().with_tau(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let config = MatchConfig {
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
