//! The exact-match short path over text-bearing fields.
//!
//! When the intent carries a quoted target, a scan over the filtered
//! descriptors often settles the query without touching a model: an exact
//! (normalized) equality scores 1.0 on the text axis, a case-insensitive
//! substring containment scores 0.6. The orchestrator may skip the
//! semantic stage entirely when exactly one exact match survives.

use canonical::Descriptor;

/// Fields scanned for the quoted target, in match-priority order.
const TEXT_FIELDS: &[&str] = &[
    "aria-label",
    "title",
    "placeholder",
    "value",
    "alt",
    "name",
    "id",
];

pub const EXACT_SCORE: f32 = 1.0;
pub const PARTIAL_SCORE: f32 = 0.6;

/// Outcome of the lexical scan for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalHit {
    /// 1.0 for exact, 0.6 for partial, 0.0 for none.
    pub score: f32,
    pub exact: bool,
}

impl LexicalHit {
    const MISS: LexicalHit = LexicalHit {
        score: 0.0,
        exact: false,
    };
}

/// Score one descriptor's text-bearing fields against the quoted target.
///
/// An empty target never matches: the pipeline must not hallucinate a
/// selection for `""`.
pub fn lexical_score(target: &str, descriptor: &Descriptor) -> LexicalHit {
    let needle = normalize(target);
    if needle.is_empty() {
        return LexicalHit::MISS;
    }

    let mut best = LexicalHit::MISS;
    fn consider(best: &mut LexicalHit, needle: &str, value: &str) {
        let haystack = normalize(value);
        if haystack.is_empty() {
            return;
        }
        if haystack == needle {
            *best = LexicalHit {
                score: EXACT_SCORE,
                exact: true,
            };
        } else if !best.exact && haystack.contains(needle) {
            *best = LexicalHit {
                score: PARTIAL_SCORE.max(best.score),
                exact: false,
            };
        }
    }

    consider(&mut best, &needle, &descriptor.text);
    for &field in TEXT_FIELDS {
        if best.exact {
            break;
        }
        if let Some(value) = descriptor.attr(field) {
            consider(&mut best, &needle, value);
        }
    }
    best
}

/// Lowercase and collapse whitespace; the comparison form on both sides.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
