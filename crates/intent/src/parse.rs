//! Recursive scan of the one-sentence instruction grammar.
//!
//! The grammar is deliberately small: a leading free-form English verb
//! phrase, one double-quoted target, and (for `type`) one `$"..."` value.
//! Anything richer belongs to the calling layer, which can always construct
//! an [`Intent`] directly.

use crate::label::label_key;
use crate::types::{Action, Intent, IntentError};

/// Verb synonyms, first-word match, case-insensitive.
const VERBS: &[(&str, Action)] = &[
    ("click", Action::Click),
    ("press", Action::Click),
    ("tap", Action::Click),
    ("push", Action::Click),
    ("type", Action::Type),
    ("enter", Action::Type),
    ("fill", Action::Type),
    ("input", Action::Type),
    ("write", Action::Type),
    ("select", Action::Select),
    ("choose", Action::Select),
    ("pick", Action::Select),
    ("hover", Action::Hover),
    ("navigate", Action::Navigate),
    ("go", Action::Navigate),
    ("open", Action::Navigate),
    ("visit", Action::Navigate),
    ("validate", Action::Validate),
    ("verify", Action::Validate),
    ("check", Action::Validate),
    ("assert", Action::Validate),
    ("expect", Action::Validate),
    ("wait", Action::Wait),
    ("pause", Action::Wait),
];

/// Parse one instruction into an [`Intent`].
pub fn parse(instruction: &str) -> Result<Intent, IntentError> {
    let trimmed = instruction.trim();
    if trimmed.is_empty() {
        return Err(IntentError::Empty);
    }

    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let action = VERBS
        .iter()
        .find(|(verb, _)| *verb == first_word)
        .map(|(_, action)| *action)
        .ok_or(IntentError::UnknownAction(first_word))?;

    let quotes = quoted_segments(trimmed);
    let value = quotes
        .iter()
        .find(|segment| segment.dollar)
        .map(|segment| segment.text.clone());
    let target = quotes
        .iter()
        .find(|segment| !segment.dollar)
        .map(|segment| segment.text.clone());

    let target = match target {
        Some(t) => t,
        // Navigation accepts a bare URL token in place of quotes.
        None if action == Action::Navigate => trimmed
            .split_whitespace()
            .find(|word| word.starts_with("http://") || word.starts_with("https://"))
            .map(str::to_string)
            .ok_or(IntentError::MissingTarget(action.as_str()))?,
        None if action == Action::Wait => String::new(),
        None => return Err(IntentError::MissingTarget(action.as_str())),
    };

    if action == Action::Type && value.is_none() {
        return Err(IntentError::MissingValue);
    }

    Ok(Intent {
        label_key: label_key(&target),
        action,
        target,
        value,
        hint_context: None,
    })
}

struct Quoted {
    text: String,
    dollar: bool,
}

/// Collect `"..."` segments, flagging those directly preceded by `$`.
fn quoted_segments(input: &str) -> Vec<Quoted> {
    let mut segments = Vec::new();
    let mut chars = input.chars();
    let mut prev: Option<char> = None;
    while let Some(c) = chars.next() {
        if c == '"' {
            let dollar = prev == Some('$');
            let mut text = String::new();
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '"' {
                    closed = true;
                    break;
                }
                text.push(inner);
            }
            if closed {
                segments.push(Quoted { text, dollar });
            }
            prev = Some('"');
        } else {
            prev = Some(c);
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_with_quoted_target() {
        let intent = parse(r#"Click "Sign in""#).unwrap();
        assert_eq!(intent.action, Action::Click);
        assert_eq!(intent.target, "Sign in");
        assert_eq!(intent.value, None);
    }

    #[test]
    fn type_with_dollar_value() {
        let intent = parse(r#"Type $"john@x" into "Email""#).unwrap();
        assert_eq!(intent.action, Action::Type);
        assert_eq!(intent.target, "Email");
        assert_eq!(intent.value.as_deref(), Some("john@x"));
    }

    #[test]
    fn type_without_value_is_rejected() {
        assert_eq!(
            parse(r#"Type into "Email""#),
            Err(IntentError::MissingValue)
        );
    }

    #[test]
    fn synonyms_map_to_actions() {
        assert_eq!(parse(r#"Press "OK""#).unwrap().action, Action::Click);
        assert_eq!(parse(r#"Choose "Blue" in "Color""#).unwrap().action, Action::Select);
        assert_eq!(parse(r#"Verify "Welcome""#).unwrap().action, Action::Validate);
    }

    #[test]
    fn empty_quoted_target_parses() {
        // The matcher turns an empty target into element_not_found; the
        // parser does not second-guess it.
        let intent = parse(r#"Click """#).unwrap();
        assert_eq!(intent.target, "");
    }

    #[test]
    fn missing_target_is_rejected() {
        assert_eq!(
            parse("Click the button"),
            Err(IntentError::MissingTarget("click"))
        );
    }

    #[test]
    fn navigate_accepts_bare_url() {
        let intent = parse("Go to https://app.example.com/login").unwrap();
        assert_eq!(intent.action, Action::Navigate);
        assert_eq!(intent.target, "https://app.example.com/login");
    }

    #[test]
    fn wait_needs_no_target() {
        let intent = parse("Wait").unwrap();
        assert_eq!(intent.action, Action::Wait);
        assert_eq!(intent.target, "");
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(matches!(
            parse(r#"Frobnicate "Thing""#),
            Err(IntentError::UnknownAction(_))
        ));
    }

    #[test]
    fn empty_instruction_is_rejected() {
        assert_eq!(parse("   "), Err(IntentError::Empty));
    }

    #[test]
    fn label_key_matches_direct_construction() {
        let parsed = parse(r#"Click "Add to Cart""#).unwrap();
        let built = Intent::new(Action::Click, "Add to Cart");
        assert_eq!(parsed.label_key, built.label_key);
    }
}
