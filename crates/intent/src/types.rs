use canonical::Digest160;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The action an instruction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Click,
    Type,
    Select,
    Hover,
    Navigate,
    Validate,
    Wait,
}

impl Action {
    /// Whether the action addresses a concrete element (and therefore needs
    /// a target and a selector). `navigate` and `wait` do not.
    pub fn targets_element(&self) -> bool {
        !matches!(self, Action::Navigate | Action::Wait)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::Select => "select",
            Action::Hover => "hover",
            Action::Navigate => "navigate",
            Action::Validate => "validate",
            Action::Wait => "wait",
        }
    }
}

/// A parsed instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: Action,
    /// Quoted target phrase; empty only for `navigate`/`wait`.
    pub target: String,
    /// Typed value; present exactly when `action` is [`Action::Type`].
    pub value: Option<String>,
    /// Optional disambiguation hint from the calling layer (e.g. `brand`
    /// when two identical labels live in different list sections).
    pub hint_context: Option<String>,
    /// Digest of the lowercased, stop-word-stripped target tokens.
    pub label_key: Digest160,
}

impl Intent {
    /// Build an intent directly (the collaborator may parse instructions
    /// itself and hand the core a finished record).
    pub fn new(action: Action, target: impl Into<String>) -> Self {
        let target = target.into();
        let label_key = crate::label::label_key(&target);
        Self {
            action,
            target,
            value: None,
            hint_context: None,
            label_key,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint_context = Some(hint.into());
        self
    }
}

/// Errors from instruction parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// The instruction was empty or whitespace.
    #[error("empty instruction")]
    Empty,
    /// No action verb could be recognized at the start of the instruction.
    #[error("unrecognized action verb: `{0}`")]
    UnknownAction(String),
    /// The action requires a quoted target and none was found.
    #[error("action `{0}` requires a quoted target")]
    MissingTarget(&'static str),
    /// A `type` instruction carried no `$\"...\"` value.
    #[error("type action requires a $\"...\" value")]
    MissingValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_targeting_split() {
        assert!(Action::Click.targets_element());
        assert!(Action::Validate.targets_element());
        assert!(!Action::Navigate.targets_element());
        assert!(!Action::Wait.targets_element());
    }

    #[test]
    fn builder_computes_label_key() {
        let a = Intent::new(Action::Click, "Sign In");
        let b = Intent::new(Action::Validate, "sign in");
        // Case and action do not affect the label key.
        assert_eq!(a.label_key, b.label_key);
    }
}
