//! The ordered synthesis strategies.

use canonical::{Descriptor, Snapshot, VolatileMatcher};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SynthError;
use crate::xpath::resolves_uniquely_to;

/// Selector strategy names, in attempt order. `Promoted` is never produced
/// by [`synthesize`]; the orchestrator uses it when a stored winner
/// short-circuits the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Id,
    TestId,
    AriaLabel,
    Name,
    TextExact,
    ClassContains,
    AttrCombo,
    Hierarchical,
    Positional,
    Promoted,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::TestId => "data-testid",
            Strategy::AriaLabel => "aria-label",
            Strategy::Name => "name",
            Strategy::TextExact => "text-exact",
            Strategy::ClassContains => "class-contains",
            Strategy::AttrCombo => "attr-combo",
            Strategy::Hierarchical => "hierarchical",
            Strategy::Positional => "positional",
            Strategy::Promoted => "promoted",
        }
    }

    /// Stable numeric tag for the promotion-store row.
    pub fn code(&self) -> u8 {
        match self {
            Strategy::Id => 1,
            Strategy::TestId => 2,
            Strategy::AriaLabel => 3,
            Strategy::Name => 4,
            Strategy::TextExact => 5,
            Strategy::ClassContains => 6,
            Strategy::AttrCombo => 7,
            Strategy::Hierarchical => 8,
            Strategy::Positional => 9,
            Strategy::Promoted => 10,
        }
    }

    /// Best-effort classification of a selector back to the strategy that
    /// would have produced it. Used when an outcome report arrives with
    /// only the xpath string.
    pub fn classify(xpath: &str) -> Strategy {
        let Ok(expr) = crate::xpath::parse(xpath) else {
            return Strategy::Promoted;
        };
        if expr.index.is_some() {
            return Strategy::Positional;
        }
        if expr.steps.len() > 1 {
            return Strategy::Hierarchical;
        }
        let step = &expr.steps[0];
        match step.preds.as_slice() {
            [crate::xpath::Pred::AttrEq(attr, _)] => match attr.as_str() {
                "id" => Strategy::Id,
                "data-testid" => Strategy::TestId,
                "aria-label" => Strategy::AriaLabel,
                "name" => Strategy::Name,
                _ => Strategy::AttrCombo,
            },
            [crate::xpath::Pred::TextEq(_)] => Strategy::TextExact,
            [crate::xpath::Pred::ClassContains(_)] => Strategy::ClassContains,
            preds if preds.len() > 1 => Strategy::AttrCombo,
            _ => Strategy::Promoted,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Strategy::Id,
            2 => Strategy::TestId,
            3 => Strategy::AriaLabel,
            4 => Strategy::Name,
            5 => Strategy::TextExact,
            6 => Strategy::ClassContains,
            7 => Strategy::AttrCombo,
            8 => Strategy::Hierarchical,
            9 => Strategy::Positional,
            10 => Strategy::Promoted,
            _ => return None,
        })
    }
}

/// A verified selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesized {
    pub xpath: String,
    pub strategy: Strategy,
}

/// Attributes eligible for the combined-attribute strategy, preference
/// order. Values are compared verbatim, so only stable descriptive
/// attributes qualify.
const COMBO_ATTRS: &[&str] = &[
    "type", "name", "placeholder", "role", "title", "alt", "value", "data-value",
];

const TEXT_EXACT_MAX_CHARS: usize = 80;

/// Synthesize a uniqueness-verified relative XPath for one element.
///
/// Strategies run in contract order; each produced selector is evaluated
/// against the element's frame and accepted only when it resolves to
/// exactly the chosen element.
pub fn synthesize(
    snapshot: &Snapshot,
    backend_id: u64,
    volatile: &VolatileMatcher,
) -> Result<Synthesized, SynthError> {
    let descriptor = snapshot
        .get(backend_id)
        .ok_or(SynthError::UnknownElement { backend_id })?;

    let mut attempts: Vec<(Strategy, String)> = Vec::new();
    attempts.extend(by_id(descriptor, volatile).map(|x| (Strategy::Id, x)));
    attempts.extend(by_testid(descriptor).map(|x| (Strategy::TestId, x)));
    attempts.extend(by_aria_label(descriptor).map(|x| (Strategy::AriaLabel, x)));
    attempts.extend(by_name(descriptor).map(|x| (Strategy::Name, x)));
    attempts.extend(by_text(descriptor).map(|x| (Strategy::TextExact, x)));
    attempts.extend(
        by_class(descriptor, volatile)
            .into_iter()
            .map(|x| (Strategy::ClassContains, x)),
    );
    attempts.extend(
        by_attr_combo(descriptor)
            .into_iter()
            .map(|x| (Strategy::AttrCombo, x)),
    );
    attempts.extend(
        by_hierarchy(snapshot, descriptor, volatile)
            .into_iter()
            .map(|x| (Strategy::Hierarchical, x)),
    );
    attempts.extend(by_position(snapshot, descriptor).map(|x| (Strategy::Positional, x)));

    let frame = Some(descriptor.frame_hash);
    for (strategy, xpath) in attempts {
        if resolves_uniquely_to(&xpath, snapshot, frame, backend_id) {
            debug!(strategy = strategy.as_str(), %xpath, "selector verified");
            return Ok(Synthesized { xpath, strategy });
        }
    }
    Err(SynthError::Exhausted { backend_id })
}

/// A value is quotable when it fits an XPath 1.0 double-quoted literal.
fn quotable(value: &str) -> bool {
    !value.is_empty() && !value.contains('"')
}

fn by_id(descriptor: &Descriptor, volatile: &VolatileMatcher) -> Option<String> {
    let id = descriptor.attr("id")?;
    if volatile.value_is_volatile(id) || !quotable(id) {
        return None;
    }
    Some(format!(r#"//*[@id="{id}"]"#))
}

fn by_testid(descriptor: &Descriptor) -> Option<String> {
    let testid = descriptor.attr("data-testid").filter(|v| quotable(v))?;
    Some(format!(r#"//*[@data-testid="{testid}"]"#))
}

fn by_aria_label(descriptor: &Descriptor) -> Option<String> {
    let label = descriptor.attr("aria-label").filter(|v| quotable(v))?;
    Some(format!(r#"//{}[@aria-label="{label}"]"#, descriptor.tag))
}

fn by_name(descriptor: &Descriptor) -> Option<String> {
    let name = descriptor.attr("name").filter(|v| quotable(v))?;
    Some(format!(r#"//{}[@name="{name}"]"#, descriptor.tag))
}

fn by_text(descriptor: &Descriptor) -> Option<String> {
    let text = descriptor.text.trim();
    if text.is_empty() || text.chars().count() > TEXT_EXACT_MAX_CHARS || !quotable(text) {
        return None;
    }
    Some(format!(
        r#"//{}[normalize-space()="{text}"]"#,
        descriptor.tag
    ))
}

fn by_class(descriptor: &Descriptor, volatile: &VolatileMatcher) -> Vec<String> {
    let Some(class) = descriptor.attr("class") else {
        return Vec::new();
    };
    volatile
        .stable_class_tokens(class)
        .into_iter()
        .filter(|token| quotable(token))
        .map(|token| format!(r#"//{}[contains(@class,"{token}")]"#, descriptor.tag))
        .collect()
}

fn combo_pairs(descriptor: &Descriptor) -> Vec<(&str, &str)> {
    COMBO_ATTRS
        .iter()
        .filter_map(|&key| {
            descriptor
                .attr(key)
                .filter(|v| quotable(v))
                .map(|value| (key, value))
        })
        .collect()
}

fn by_attr_combo(descriptor: &Descriptor) -> Vec<String> {
    let usable = combo_pairs(descriptor);
    let mut selectors = Vec::new();
    for (i, (a_key, a_value)) in usable.iter().enumerate() {
        for (b_key, b_value) in usable.iter().skip(i + 1) {
            selectors.push(format!(
                r#"//{}[@{a_key}="{a_value}" and @{b_key}="{b_value}"]"#,
                descriptor.tag
            ));
        }
    }
    selectors
}

/// Best single predicate for an element inside a hierarchical selector.
fn local_predicate(descriptor: &Descriptor, volatile: &VolatileMatcher) -> Option<String> {
    if let Some(id) = descriptor.attr("id") {
        if !volatile.value_is_volatile(id) && quotable(id) {
            return Some(format!(r#"@id="{id}""#));
        }
    }
    if let Some(testid) = descriptor.attr("data-testid").filter(|v| quotable(v)) {
        return Some(format!(r#"@data-testid="{testid}""#));
    }
    if let Some(label) = descriptor.attr("aria-label").filter(|v| quotable(v)) {
        return Some(format!(r#"@aria-label="{label}""#));
    }
    if let Some(class) = descriptor.attr("class") {
        if let Some(token) = volatile
            .stable_class_tokens(class)
            .into_iter()
            .find(|t| quotable(t))
        {
            return Some(format!(r#"contains(@class,"{token}")"#));
        }
    }
    let text = descriptor.text.trim();
    if !text.is_empty() && text.chars().count() <= TEXT_EXACT_MAX_CHARS && quotable(text) {
        return Some(format!(r#"normalize-space()="{text}""#));
    }
    None
}

/// Anchor under up to two ancestors that carry predicates of their own.
/// `/html` and `/body` never appear; ancestors without a usable predicate
/// are skipped rather than rendered bare.
fn by_hierarchy(
    snapshot: &Snapshot,
    descriptor: &Descriptor,
    volatile: &VolatileMatcher,
) -> Vec<String> {
    let own = local_predicate(descriptor, volatile)
        .map(|pred| format!("{}[{pred}]", descriptor.tag))
        .unwrap_or_else(|| descriptor.tag.clone());

    let mut anchored: Vec<(String, String)> = Vec::new(); // (tag, pred)
    let mut current = descriptor.parent_id;
    while let Some(ancestor_id) = current {
        let Some(ancestor) = snapshot.get(ancestor_id) else {
            break;
        };
        current = ancestor.parent_id;
        if matches!(ancestor.tag.as_str(), "html" | "body") {
            continue;
        }
        if let Some(pred) = local_predicate(ancestor, volatile) {
            anchored.push((ancestor.tag.clone(), pred));
            if anchored.len() == 2 {
                break;
            }
        }
    }

    let mut selectors = Vec::new();
    // Nearest single anchor first, then the two-ancestor form.
    if let Some((tag, pred)) = anchored.first() {
        selectors.push(format!("//{tag}[{pred}]//{own}"));
    }
    if anchored.len() == 2 {
        let (inner_tag, inner_pred) = &anchored[0];
        let (outer_tag, outer_pred) = &anchored[1];
        selectors.push(format!(
            "//{outer_tag}[{outer_pred}]//{inner_tag}[{inner_pred}]//{own}"
        ));
    }
    selectors
}

fn by_position(snapshot: &Snapshot, descriptor: &Descriptor) -> Option<String> {
    let position = snapshot
        .frame_members(descriptor.frame_hash)
        .iter()
        .filter(|d| d.tag == descriptor.tag)
        .position(|d| d.backend_id == descriptor.backend_id)?;
    Some(format!("(//{})[{}]", descriptor.tag, position + 1))
}
