//! Label-key normalization: the stable digest that scopes promotions and
//! feeds the id-match heuristic.

use canonical::{label_digest, Digest160};

/// Function words stripped before hashing a target phrase. Both sides of a
/// comparison (intent target, element id tokens) pass through the same
/// stripping, so dropping `in` from `"Sign In"` stays consistent.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "to", "of", "in", "on", "for", "and", "or", "with", "into", "at", "my",
    "your", "please",
];

/// Lowercased, stop-word-stripped word tokens of a target phrase.
///
/// Splitting is on any non-alphanumeric boundary so `sign-in`, `Sign In`,
/// and `sign_in` normalize identically.
pub fn label_tokens(target: &str) -> Vec<String> {
    target
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Digest of [`label_tokens`], the promotion-store key component.
pub fn label_key(target: &str) -> Digest160 {
    let tokens = label_tokens(target);
    label_digest(tokens.iter().map(String::as_str))
}
