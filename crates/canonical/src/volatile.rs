//! Detection of runtime-volatile attribute keys and values.
//!
//! Single-page frameworks regenerate element ids, class tokens, and wiring
//! attributes on every render. Anchoring a hash or a selector on one of
//! those produces an identity that dies with the next paint, so both the
//! hashing pipeline and the selector synthesizer consult this matcher
//! before trusting an attribute.

use once_cell::sync::Lazy;
use regex::RegexSet;

use crate::error::CanonicalError;

/// Default volatile shapes, in source order:
///
/// 1. Autogenerated hash-like ids (`input-3f9ac2`, `ab12cd34ef`).
/// 2. Ember view ids (`ember123`).
/// 3. React Aria autogenerated ids.
/// 4. Radix UI portal ids.
/// 5. Ephemeral `aria-owns` suffixes.
///
/// The list is configuration (`CanonicalizeConfig::volatile_patterns`);
/// these are only the defaults.
pub const DEFAULT_VOLATILE_PATTERNS: &[&str] = &[
    r"^[A-Za-z]+-?[0-9a-f]{6,}$",
    r"^ember\d+$",
    r"^react-aria\d+(-\d+)*$",
    r"^radix-[:\w-]+$",
    r"^aria-owns-\d+$",
];

/// Attribute keys that are volatile regardless of value: framework-internal
/// wiring that never describes the element itself.
static VOLATILE_KEYS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^__reactFiber",
        r"^__reactProps",
        r"^data-reactid$",
        r"^data-v-[0-9a-f]+$",
        r"^data-ember-action",
    ])
    .expect("static volatile key patterns compile")
});

/// Compiled volatile-value matcher built from a pattern list.
#[derive(Debug)]
pub struct VolatileMatcher {
    values: RegexSet,
}

impl VolatileMatcher {
    /// Compile a matcher from the configured pattern list.
    pub fn new(patterns: &[String]) -> Result<Self, CanonicalError> {
        let values = RegexSet::new(patterns).map_err(|e| {
            CanonicalError::InvalidConfig(format!("volatile pattern does not compile: {e}"))
        })?;
        Ok(Self { values })
    }

    /// Whether an attribute value looks autogenerated.
    pub fn value_is_volatile(&self, value: &str) -> bool {
        self.values.is_match(value)
    }

    /// Whether an attribute key is framework wiring.
    pub fn key_is_volatile(&self, key: &str) -> bool {
        VOLATILE_KEYS.is_match(key)
    }

    /// Whether the attribute should be excluded from hash inputs.
    ///
    /// Keys are always checked; values are only checked for the identity
    /// attributes (`id`, `class`, `for`, `aria-owns`, `aria-controls`,
    /// `aria-labelledby`) where autogenerated tokens actually appear.
    pub fn attr_is_volatile(&self, key: &str, value: &str) -> bool {
        if self.key_is_volatile(key) {
            return true;
        }
        match key {
            "id" | "for" | "aria-owns" | "aria-controls" | "aria-labelledby" => {
                self.value_is_volatile(value)
            }
            "class" => value
                .split_whitespace()
                .all(|token| self.value_is_volatile(token)),
            _ => false,
        }
    }

    /// The class tokens of `value` that are safe to anchor on.
    pub fn stable_class_tokens<'a>(&self, value: &'a str) -> Vec<&'a str> {
        value
            .split_whitespace()
            .filter(|token| !self.value_is_volatile(token))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_matcher() -> VolatileMatcher {
        let patterns: Vec<String> = DEFAULT_VOLATILE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        VolatileMatcher::new(&patterns).unwrap()
    }

    #[test]
    fn hash_like_ids_are_volatile() {
        let m = default_matcher();
        assert!(m.value_is_volatile("input-3f9ac2"));
        assert!(m.value_is_volatile("ab12cd34ef"));
        assert!(m.value_is_volatile("ember42"));
        assert!(m.value_is_volatile("react-aria-3-1"));
    }

    #[test]
    fn human_ids_are_stable() {
        let m = default_matcher();
        assert!(!m.value_is_volatile("login-form"));
        assert!(!m.value_is_volatile("email"));
        assert!(!m.value_is_volatile("submit-button"));
    }

    #[test]
    fn fiber_keys_are_volatile() {
        let m = default_matcher();
        assert!(m.key_is_volatile("__reactFiber$abc123"));
        assert!(m.key_is_volatile("data-reactid"));
        assert!(!m.key_is_volatile("data-testid"));
    }

    #[test]
    fn class_is_volatile_only_when_every_token_is() {
        let m = default_matcher();
        assert!(m.attr_is_volatile("class", "css-1a2b3c4d"));
        assert!(!m.attr_is_volatile("class", "btn css-1a2b3c4d"));
        assert_eq!(m.stable_class_tokens("btn css-1a2b3c4d primary"), vec![
            "btn", "primary"
        ]);
    }

    #[test]
    fn custom_pattern_list_is_honored() {
        let m = VolatileMatcher::new(&[r"^generated-".to_string()]).unwrap();
        assert!(m.value_is_volatile("generated-77"));
        assert!(!m.value_is_volatile("input-3f9ac2"));
    }
}
