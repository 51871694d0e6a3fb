//! Deterministic structural and accessibility scoring.
//!
//! Every tuning constant lives in [`weights`]; nothing here consults a
//! model or a clock, so the axis is reproducible byte-for-byte given the
//! same snapshot and intent. Each applied rule also contributes a reason
//! string that survives into near-miss diagnostics.

use canonical::{Descriptor, Snapshot, VolatileMatcher};
use intent::{label_key, label_tokens, Intent};

use crate::filter::natively_suited;

/// The consolidated heuristic weight table.
pub mod weights {
    /// Element id normalizes to the same label key as the target.
    pub const ID_LABEL_MATCH: f32 = 0.30;
    /// `data-testid` equals or contains the normalized target.
    pub const TESTID_MATCH: f32 = 0.25;
    /// `aria-label` equals the target.
    pub const ARIA_LABEL_EQUAL: f32 = 0.20;
    /// `type` attribute names a target token (`type=email` for "Email").
    pub const TYPE_MATCHES_TARGET: f32 = 0.20;
    /// The whole target phrase appears in text or `aria-label`.
    pub const PHRASE_MATCH: f32 = 0.15;
    /// Visible and enabled.
    pub const VISIBLE_ENABLED: f32 = 0.10;
    /// Hidden, `disabled`, or `aria-disabled=true`.
    pub const HIDDEN_OR_DISABLED: f32 = -0.40;
    /// Survived the filter on a marker despite an unsuited tag
    /// (`div[role=button]` and similar).
    pub const ROLE_MISMATCH: f32 = -0.30;
    /// id or class token looks autogenerated.
    pub const VOLATILE_IDENTITY: f32 = -0.20;
    /// Sibling context names a different category than the intent.
    pub const ENTITY_MISMATCH: f32 = -0.30;
}

/// Category nouns the entity-mismatch rule recognizes, singular form.
const CATEGORY_NOUNS: &[&str] = &[
    "brand", "color", "colour", "size", "model", "phone", "laptop", "tablet", "email",
    "password", "price", "category",
];

/// Score one filtered candidate; returns the additive score and the names
/// of the rules that fired.
pub fn heuristic_score(
    intent: &Intent,
    descriptor: &Descriptor,
    snapshot: &Snapshot,
    volatile: &VolatileMatcher,
) -> (f32, Vec<&'static str>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    let mut apply = |value: f32, reason: &'static str| {
        score += value;
        reasons.push(reason);
    };

    let target_tokens = label_tokens(&intent.target);

    if let Some(id) = descriptor.attr("id") {
        if !target_tokens.is_empty() && label_key(id) == intent.label_key {
            apply(weights::ID_LABEL_MATCH, "id-label-match");
        }
    }

    if let Some(testid) = descriptor.attr("data-testid") {
        let testid_tokens = label_tokens(testid);
        let covered = !target_tokens.is_empty()
            && target_tokens.iter().all(|t| testid_tokens.contains(t));
        if covered {
            apply(weights::TESTID_MATCH, "testid-match");
        }
    }

    if let Some(aria) = descriptor.attr("aria-label") {
        if !intent.target.is_empty() && normalize(aria) == normalize(&intent.target) {
            apply(weights::ARIA_LABEL_EQUAL, "aria-label-equal");
        }
    }

    if let Some(input_type) = descriptor.attr("type") {
        if target_tokens.iter().any(|t| t == input_type) {
            apply(weights::TYPE_MATCHES_TARGET, "type-matches-target");
        }
    }

    if phrase_match(intent, descriptor) {
        apply(weights::PHRASE_MATCH, "phrase-match");
    }

    if descriptor.visible && !descriptor.is_disabled() {
        apply(weights::VISIBLE_ENABLED, "visible-enabled");
    } else {
        apply(weights::HIDDEN_OR_DISABLED, "hidden-or-disabled");
    }

    if !natively_suited(intent.action, descriptor) {
        apply(weights::ROLE_MISMATCH, "role-mismatch");
    }

    if volatile_identity(descriptor, volatile) {
        apply(weights::VOLATILE_IDENTITY, "volatile-identity");
    }

    if entity_mismatch(intent, descriptor, snapshot) {
        apply(weights::ENTITY_MISMATCH, "entity-mismatch");
    }

    (score, reasons)
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn phrase_match(intent: &Intent, descriptor: &Descriptor) -> bool {
    let phrase = normalize(&intent.target);
    if phrase.is_empty() {
        return false;
    }
    if normalize(&descriptor.text).contains(&phrase) {
        return true;
    }
    descriptor
        .attr("aria-label")
        .map(|aria| normalize(aria).contains(&phrase))
        .unwrap_or(false)
}

fn volatile_identity(descriptor: &Descriptor, volatile: &VolatileMatcher) -> bool {
    if let Some(id) = descriptor.attr("id") {
        if volatile.value_is_volatile(id) {
            return true;
        }
    }
    if let Some(class) = descriptor.attr("class") {
        if class
            .split_whitespace()
            .any(|token| volatile.value_is_volatile(token))
        {
            return true;
        }
    }
    false
}

/// First recognized category noun in a text, singular form.
fn category_of(text: &str) -> Option<&'static str> {
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        for &noun in CATEGORY_NOUNS {
            if token == noun || token == format!("{noun}s") {
                return Some(noun);
            }
        }
    }
    None
}

/// The intent names (or hints) a category and the candidate's local context
/// names a different one.
fn entity_mismatch(intent: &Intent, descriptor: &Descriptor, snapshot: &Snapshot) -> bool {
    let wanted = intent
        .hint_context
        .as_deref()
        .and_then(category_of)
        .or_else(|| category_of(&intent.target));
    let Some(wanted) = wanted else {
        return false;
    };

    let mut context = String::new();
    if let Some(parent) = snapshot.parent_of(descriptor.backend_id) {
        for key in ["id", "class", "aria-label", "data-testid"] {
            if let Some(value) = parent.attr(key) {
                context.push_str(value);
                context.push(' ');
            }
        }
        context.push_str(&parent.text);
        context.push(' ');
    }
    for sibling in snapshot.siblings_of(descriptor.backend_id) {
        context.push_str(&sibling.text);
        context.push(' ');
    }

    match category_of(&context) {
        Some(found) => found != wanted,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canonical::{canonicalize, CanonicalizeConfig, RawElement, RawSnapshot};
    use intent::Action;

    fn matcher() -> VolatileMatcher {
        VolatileMatcher::new(&CanonicalizeConfig::default().volatile_patterns).unwrap()
    }

    fn snapshot_of(elements: Vec<RawElement>) -> Snapshot {
        canonicalize(
            &RawSnapshot {
                origin: "https://x".into(),
                path: "/".into(),
                elements,
            },
            &CanonicalizeConfig::default(),
        )
        .unwrap()
    }

    fn element(id: u64, tag: &str, text: &str, attrs: &[(&str, &str)]) -> RawElement {
        RawElement {
            backend_id: Some(id),
            tag: Some(tag.into()),
            text: Some(text.into()),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn id_label_match_fires() {
        let snapshot = snapshot_of(vec![element(
            1,
            "button",
            "",
            &[("id", "sign-in")],
        )]);
        let intent = Intent::new(Action::Click, "Sign In");
        let (score, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"id-label-match"));
        assert!(score > weights::ID_LABEL_MATCH);
    }

    #[test]
    fn testid_containment_fires() {
        let snapshot = snapshot_of(vec![element(
            1,
            "button",
            "",
            &[("data-testid", "header-sign-in-button")],
        )]);
        let intent = Intent::new(Action::Click, "Sign In");
        let (_, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"testid-match"));
    }

    #[test]
    fn type_attribute_matches_target_token() {
        let snapshot = snapshot_of(vec![element(1, "input", "", &[("type", "email")])]);
        let intent = Intent::new(Action::Type, "Email").with_value("a@b.c");
        let (_, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"type-matches-target"));
    }

    #[test]
    fn disabled_element_is_penalized() {
        let snapshot = snapshot_of(vec![element(
            1,
            "button",
            "Save",
            &[("disabled", "")],
        )]);
        let intent = Intent::new(Action::Click, "Save");
        let (score, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"hidden-or-disabled"));
        assert!(!reasons.contains(&"visible-enabled"));
        // Phrase match (+0.15) minus disabled (-0.40) stays negative.
        assert!(score < 0.0);
    }

    #[test]
    fn rescued_div_gets_role_mismatch() {
        let snapshot = snapshot_of(vec![element(
            1,
            "div",
            "Buy",
            &[("role", "button")],
        )]);
        let intent = Intent::new(Action::Click, "Buy");
        let (_, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"role-mismatch"));
    }

    #[test]
    fn volatile_identity_is_penalized() {
        let snapshot = snapshot_of(vec![element(
            1,
            "button",
            "Go",
            &[("id", "btn-8f2ac9")],
        )]);
        let intent = Intent::new(Action::Click, "Go");
        let (_, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"volatile-identity"));
    }

    #[test]
    fn entity_mismatch_disambiguates_list_sections() {
        // Two "Apple" items: one under ul#brands, one under ul#colors.
        let snapshot = snapshot_of(vec![
            element(1, "ul", "", &[("id", "brands")]),
            {
                let mut li = element(2, "li", "Apple", &[("data-value", "apple")]);
                li.parent_id = Some(1);
                li
            },
            element(3, "ul", "", &[("id", "colors")]),
            {
                let mut li = element(4, "li", "Apple", &[("data-value", "apple")]);
                li.parent_id = Some(3);
                li
            },
        ]);
        let intent = Intent::new(Action::Select, "Apple").with_hint("brand");

        let (brand_score, brand_reasons) =
            heuristic_score(&intent, snapshot.get(2).unwrap(), &snapshot, &matcher());
        let (color_score, color_reasons) =
            heuristic_score(&intent, snapshot.get(4).unwrap(), &snapshot, &matcher());

        assert!(!brand_reasons.contains(&"entity-mismatch"));
        assert!(color_reasons.contains(&"entity-mismatch"));
        assert!(brand_score > color_score);
    }

    #[test]
    fn category_noun_in_target_triggers_context_check() {
        let snapshot = snapshot_of(vec![
            element(1, "section", "", &[("id", "laptops")]),
            {
                let mut item = element(2, "a", "Galaxy", &[("href", "/p/1")]);
                item.parent_id = Some(1);
                item
            },
        ]);
        // Target names "phone" but the section is laptops.
        let intent = Intent::new(Action::Click, "Galaxy phone");
        let (_, reasons) =
            heuristic_score(&intent, snapshot.get(2).unwrap(), &snapshot, &matcher());
        assert!(reasons.contains(&"entity-mismatch"));
    }

    #[test]
    fn no_category_signal_means_no_penalty() {
        let snapshot = snapshot_of(vec![element(1, "button", "Apple", &[])]);
        let intent = Intent::new(Action::Click, "Apple");
        let (_, reasons) =
            heuristic_score(&intent, snapshot.get(1).unwrap(), &snapshot, &matcher());
        assert!(!reasons.contains(&"entity-mismatch"));
    }
}
