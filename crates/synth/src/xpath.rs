//! Parser and evaluator for the emitted XPath subset.
//!
//! Grammar (everything the synthesizer produces, nothing more):
//!
//! ```text
//! selector := steps | '(' steps ')[' index ']'
//! steps    := step+
//! step     := '//' name predicates?
//! name     := tag | '*'
//! preds    := '[' pred (' and ' pred)* ']'
//! pred     := '@' attr '="' value '"'
//!           | 'normalize-space()="' value '"'
//!           | 'contains(@class,"' value '")'
//! ```
//!
//! Evaluation runs against the canonical snapshot: the final step matches
//! the element itself, earlier steps must match distinct ancestors in
//! order, and the optional index selects the n-th match (1-based, document
//! order) within the frame.

use canonical::{Descriptor, Digest160, Snapshot};

use crate::error::SynthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pred {
    AttrEq(String, String),
    TextEq(String),
    ClassContains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    /// `None` renders as `*`.
    pub tag: Option<String>,
    pub preds: Vec<Pred>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathExpr {
    pub steps: Vec<Step>,
    /// 1-based positional suffix.
    pub index: Option<usize>,
}

/// Rewrite an upstream selector to the relative contract.
///
/// `/html/body//x` and `/html//x` become `//x`; a path that still needs
/// single-slash child steps after stripping cannot be expressed in the
/// descendant-only subset and is rejected.
pub fn ensure_relative(xpath: &str) -> Result<String, SynthError> {
    let trimmed = xpath.trim();
    if trimmed.starts_with("//") {
        return Ok(trimmed.to_string());
    }
    if !trimmed.starts_with('/') {
        return Err(SynthError::UnsupportedSyntax(format!(
            "selector must start with '//', got `{trimmed}`"
        )));
    }
    let mut rest = trimmed;
    for prefix in ["/html", "/body"] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
        }
    }
    if rest.starts_with("//") {
        return Ok(rest.to_string());
    }
    Err(SynthError::AbsolutePath(trimmed.to_string()))
}

/// Evaluate a selector against the snapshot, optionally confined to one
/// frame. Returns matching backend ids in document order.
pub fn evaluate(
    xpath: &str,
    snapshot: &Snapshot,
    frame: Option<Digest160>,
) -> Result<Vec<u64>, SynthError> {
    let expr = parse(xpath)?;
    let mut matches: Vec<u64> = snapshot
        .descriptors
        .iter()
        .filter(|d| frame.map(|f| d.frame_hash == f).unwrap_or(true))
        .filter(|d| matches_steps(&expr.steps, d, snapshot))
        .map(|d| d.backend_id)
        .collect();
    if let Some(index) = expr.index {
        matches = match matches.get(index.wrapping_sub(1)) {
            Some(&id) => vec![id],
            None => Vec::new(),
        };
    }
    Ok(matches)
}

/// Whether the selector resolves to exactly the given element.
pub fn resolves_uniquely_to(
    xpath: &str,
    snapshot: &Snapshot,
    frame: Option<Digest160>,
    backend_id: u64,
) -> bool {
    matches!(evaluate(xpath, snapshot, frame), Ok(ids) if ids == [backend_id])
}

fn matches_steps(steps: &[Step], descriptor: &Descriptor, snapshot: &Snapshot) -> bool {
    let Some((last, ancestors_spec)) = steps.split_last() else {
        return false;
    };
    if !matches_step(last, descriptor) {
        return false;
    }
    // Earlier steps must match ancestors bottom-up, innermost spec last.
    let mut current = descriptor.parent_id;
    for spec in ancestors_spec.iter().rev() {
        let mut found = false;
        while let Some(ancestor_id) = current {
            let Some(ancestor) = snapshot.get(ancestor_id) else {
                break;
            };
            current = ancestor.parent_id;
            if matches_step(spec, ancestor) {
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }
    true
}

fn matches_step(step: &Step, descriptor: &Descriptor) -> bool {
    if let Some(tag) = &step.tag {
        if descriptor.tag != *tag {
            return false;
        }
    }
    step.preds.iter().all(|pred| match pred {
        Pred::AttrEq(attr, value) => descriptor.attr(attr) == Some(value.as_str()),
        Pred::TextEq(value) => descriptor.text.trim() == value,
        Pred::ClassContains(token) => descriptor
            .attr("class")
            .map(|class| class.contains(token.as_str()))
            .unwrap_or(false),
    })
}

pub(crate) fn parse(xpath: &str) -> Result<PathExpr, SynthError> {
    let input = xpath.trim();
    let unsupported = |at: &str| SynthError::UnsupportedSyntax(format!("{at} in `{input}`"));

    let (body, index) = if let Some(rest) = input.strip_prefix('(') {
        let close = rest.rfind(')').ok_or_else(|| unsupported("unclosed group"))?;
        let suffix = &rest[close + 1..];
        let bracketed = suffix
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| unsupported("group without positional index"))?;
        let index: usize = bracketed
            .parse()
            .map_err(|_| unsupported("non-numeric positional index"))?;
        if index == 0 {
            return Err(unsupported("positional index is 1-based"));
        }
        (&rest[..close], Some(index))
    } else {
        (input, None)
    };

    if !body.starts_with("//") {
        return Err(unsupported("selector must start with '//'"));
    }

    let mut steps = Vec::new();
    for raw_step in body.split("//").skip(1) {
        if raw_step.is_empty() {
            return Err(unsupported("empty step"));
        }
        steps.push(parse_step(raw_step, &unsupported)?);
    }
    if steps.is_empty() {
        return Err(unsupported("no steps"));
    }
    Ok(PathExpr { steps, index })
}

fn parse_step(
    raw: &str,
    unsupported: &dyn Fn(&str) -> SynthError,
) -> Result<Step, SynthError> {
    let (name, preds_raw) = match raw.find('[') {
        Some(open) => {
            let preds = raw[open..]
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| unsupported("malformed predicate brackets"))?;
            (&raw[..open], Some(preds))
        }
        None => (raw, None),
    };

    if name.is_empty() || name.contains('/') {
        return Err(unsupported("child-axis steps are not supported"));
    }
    let tag = if name == "*" {
        None
    } else if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Some(name.to_string())
    } else {
        return Err(unsupported("invalid step name"));
    };

    let mut preds = Vec::new();
    if let Some(preds_raw) = preds_raw {
        for part in split_conjuncts(preds_raw) {
            preds.push(parse_pred(part.trim(), unsupported)?);
        }
    }
    Ok(Step { tag, preds })
}

/// Split on ` and ` outside string literals, so quoted values containing
/// the word keep their shape (`normalize-space()="Terms and Conditions"`).
fn split_conjuncts(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut at = 0;
    while at < bytes.len() {
        match bytes[at] {
            b'"' => {
                in_quotes = !in_quotes;
                at += 1;
            }
            b' ' if !in_quotes && raw[at..].starts_with(" and ") => {
                parts.push(&raw[start..at]);
                at += " and ".len();
                start = at;
            }
            _ => at += 1,
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn parse_pred(
    raw: &str,
    unsupported: &dyn Fn(&str) -> SynthError,
) -> Result<Pred, SynthError> {
    if let Some(rest) = raw.strip_prefix("normalize-space()=") {
        return Ok(Pred::TextEq(unquote(rest, unsupported)?));
    }
    if let Some(rest) = raw.strip_prefix("contains(@class,") {
        let inner = rest
            .strip_suffix(')')
            .ok_or_else(|| unsupported("unclosed contains()"))?;
        return Ok(Pred::ClassContains(unquote(inner.trim(), unsupported)?));
    }
    if let Some(rest) = raw.strip_prefix('@') {
        let eq = rest.find('=').ok_or_else(|| unsupported("predicate without '='"))?;
        let attr = &rest[..eq];
        if attr.is_empty()
            || !attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            return Err(unsupported("invalid attribute name"));
        }
        return Ok(Pred::AttrEq(
            attr.to_string(),
            unquote(&rest[eq + 1..], unsupported)?,
        ));
    }
    Err(unsupported("unrecognized predicate"))
}

fn unquote(raw: &str, unsupported: &dyn Fn(&str) -> SynthError) -> Result<String, SynthError> {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| unsupported("value must be double-quoted"))
}
