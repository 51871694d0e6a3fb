//! Hard candidate filters per action.
//!
//! These are exclusion rules, not scores: an element that fails the filter
//! for an action is invisible to every later stage. The rules are
//! deliberately permissive at the edges (an explicit interactivity marker
//! rescues a `div` for clicking); the heuristic layer penalizes the odd
//! survivors instead of losing them here.

use canonical::Descriptor;
use intent::Action;

/// Accessibility roles that make an element clickable.
const CLICKABLE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "option", "checkbox", "radio", "switch",
];

/// Tags that are natively clickable (for `<a>` only with an `href`).
const CLICKABLE_TAGS: &[&str] = &["button", "summary"];

const SELECT_ROLES: &[&str] = &["combobox", "listbox", "option"];

/// Whether `descriptor` survives the hard filter for `action`.
pub fn action_filter(action: Action, descriptor: &Descriptor) -> bool {
    match action {
        Action::Click => is_visible(descriptor) && is_clickable(descriptor),
        Action::Type => is_visible(descriptor) && is_typable(descriptor),
        Action::Select => is_visible(descriptor) && is_selectable(descriptor),
        Action::Hover => is_visible(descriptor),
        // Validation may target hidden or purely textual content.
        Action::Validate => true,
        // Navigation never addresses an element.
        Action::Navigate | Action::Wait => false,
    }
}

fn is_visible(descriptor: &Descriptor) -> bool {
    descriptor.visible
}

fn is_clickable(descriptor: &Descriptor) -> bool {
    if CLICKABLE_TAGS.contains(&descriptor.tag.as_str()) {
        return true;
    }
    if descriptor.tag == "a" && descriptor.attr("href").is_some() {
        return true;
    }
    if descriptor.tag == "input" {
        return matches!(
            descriptor.attr("type").unwrap_or("text"),
            "button" | "submit" | "reset" | "checkbox" | "radio" | "image"
        );
    }
    if CLICKABLE_ROLES.contains(&effective_role(descriptor)) {
        return true;
    }
    has_interactivity_marker(descriptor)
}

/// Explicit interactivity markers that rescue a non-native container.
pub(crate) fn has_interactivity_marker(descriptor: &Descriptor) -> bool {
    if descriptor.attr("onclick").is_some() || descriptor.attr("data-click").is_some() {
        return true;
    }
    if descriptor.attr("role") == Some("button") {
        return true;
    }
    matches!(
        descriptor
            .attr("tabindex")
            .and_then(|t| t.parse::<i32>().ok()),
        Some(t) if t >= 0
    )
}

fn is_typable(descriptor: &Descriptor) -> bool {
    match descriptor.tag.as_str() {
        "input" => descriptor.attr("type") != Some("hidden"),
        "textarea" => true,
        _ => matches!(descriptor.attr("contenteditable"), Some("true") | Some("")),
    }
}

fn is_selectable(descriptor: &Descriptor) -> bool {
    if descriptor.tag == "select" || descriptor.tag == "option" {
        return true;
    }
    if SELECT_ROLES.contains(&effective_role(descriptor)) {
        return true;
    }
    descriptor.attr("data-value").is_some()
}

/// Role from the ax tree, falling back to the `role` attribute.
pub(crate) fn effective_role(descriptor: &Descriptor) -> &str {
    if !descriptor.role.is_empty() {
        descriptor.role.as_str()
    } else {
        descriptor.attr("role").unwrap_or("")
    }
}

/// Whether the element's own tag suits the action, as opposed to being
/// rescued by a role or marker (`div[role=button]` and friends). Feeds the
/// role-mismatch penalty.
pub(crate) fn natively_suited(action: Action, descriptor: &Descriptor) -> bool {
    match action {
        Action::Click => {
            CLICKABLE_TAGS.contains(&descriptor.tag.as_str())
                || (descriptor.tag == "a" && descriptor.attr("href").is_some())
                || descriptor.tag == "input"
        }
        Action::Type => matches!(descriptor.tag.as_str(), "input" | "textarea"),
        Action::Select => matches!(descriptor.tag.as_str(), "select" | "option"),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canonical::Digest160;
    use std::collections::BTreeMap;

    fn descriptor(tag: &str, attrs: &[(&str, &str)]) -> Descriptor {
        Descriptor {
            backend_id: 1,
            parent_id: None,
            tag: tag.into(),
            role: String::new(),
            text: String::new(),
            raw_text: String::new(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            frame_path: vec![],
            frame_hash: Digest160::default(),
            in_shadow: false,
            visible: true,
            bbox: None,
            content_hash: Digest160::default(),
        }
    }

    #[test]
    fn buttons_and_links_are_clickable() {
        assert!(action_filter(Action::Click, &descriptor("button", &[])));
        assert!(action_filter(
            Action::Click,
            &descriptor("a", &[("href", "/home")])
        ));
        // An anchor without href is not a link.
        assert!(!action_filter(Action::Click, &descriptor("a", &[])));
    }

    #[test]
    fn text_containers_are_not_clickable() {
        assert!(!action_filter(Action::Click, &descriptor("div", &[])));
        assert!(!action_filter(Action::Click, &descriptor("span", &[])));
        assert!(!action_filter(Action::Click, &descriptor("p", &[])));
    }

    #[test]
    fn markers_rescue_divs_for_click() {
        assert!(action_filter(
            Action::Click,
            &descriptor("div", &[("onclick", "go()")])
        ));
        assert!(action_filter(
            Action::Click,
            &descriptor("div", &[("role", "button")])
        ));
        assert!(action_filter(
            Action::Click,
            &descriptor("div", &[("tabindex", "0")])
        ));
        assert!(!action_filter(
            Action::Click,
            &descriptor("div", &[("tabindex", "-1")])
        ));
    }

    #[test]
    fn hidden_inputs_are_not_typable() {
        assert!(action_filter(Action::Type, &descriptor("input", &[])));
        assert!(action_filter(Action::Type, &descriptor("textarea", &[])));
        assert!(!action_filter(
            Action::Type,
            &descriptor("input", &[("type", "hidden")])
        ));
        assert!(action_filter(
            Action::Type,
            &descriptor("div", &[("contenteditable", "true")])
        ));
        assert!(!action_filter(Action::Type, &descriptor("div", &[])));
    }

    #[test]
    fn invisible_elements_fail_interactive_filters_but_pass_validate() {
        let mut hidden = descriptor("button", &[]);
        hidden.visible = false;
        assert!(!action_filter(Action::Click, &hidden));
        assert!(action_filter(Action::Validate, &hidden));
    }

    #[test]
    fn select_accepts_native_and_aria_widgets() {
        assert!(action_filter(Action::Select, &descriptor("select", &[])));
        assert!(action_filter(
            Action::Select,
            &descriptor("div", &[("role", "combobox")])
        ));
        assert!(action_filter(
            Action::Select,
            &descriptor("li", &[("data-value", "blue")])
        ));
        assert!(!action_filter(Action::Select, &descriptor("div", &[])));
    }

    #[test]
    fn navigation_addresses_no_element() {
        assert!(!action_filter(Action::Navigate, &descriptor("a", &[("href", "/")])));
        assert!(!action_filter(Action::Wait, &descriptor("button", &[])));
    }

    #[test]
    fn native_suitability_distinguishes_rescued_divs() {
        assert!(natively_suited(Action::Click, &descriptor("button", &[])));
        assert!(!natively_suited(
            Action::Click,
            &descriptor("div", &[("role", "button")])
        ));
        assert!(!natively_suited(
            Action::Click,
            &descriptor("div", &[("onclick", "go()")])
        ));
    }
}
