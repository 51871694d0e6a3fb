//! Canonical fragment rendering for the embedding and re-ranking providers.
//!
//! Element embeddings are computed over a compact, deterministic textual
//! rendering of the descriptor, so equal `content_hash` always yields an
//! equal fragment and therefore an equal vector. The re-ranker additionally
//! receives a bounded local neighborhood: parent, up to four siblings, and
//! the element's own subtree, each truncated to the configured context cap.

use crate::descriptor::Descriptor;
use crate::snapshot::Snapshot;

/// Attributes worth surfacing to the embedding model, in render order.
const SALIENT_ATTRS: &[&str] = &[
    "role",
    "aria-label",
    "placeholder",
    "title",
    "name",
    "type",
    "value",
    "alt",
    "href",
    "data-testid",
];

const MAX_CONTEXT_SIBLINGS: usize = 4;

/// Render one descriptor as a canonical tag-with-attrs fragment, e.g.
/// `<button type="submit" aria-label="Sign in">Sign in</button>`.
pub fn element_fragment(descriptor: &Descriptor) -> String {
    let mut out = String::new();
    out.push('<');
    out.push_str(&descriptor.tag);
    if !descriptor.role.is_empty() && descriptor.attr("role").is_none() {
        out.push_str(" role=\"");
        out.push_str(&descriptor.role);
        out.push('"');
    }
    for &key in SALIENT_ATTRS {
        if let Some(value) = descriptor.attr(key) {
            if value.is_empty() {
                continue;
            }
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
    }
    out.push('>');
    out.push_str(&descriptor.text);
    out.push_str("</");
    out.push_str(&descriptor.tag);
    out.push('>');
    out
}

/// Render the element plus its bounded neighborhood for the re-ranker.
///
/// Layout is line-oriented so a text-pair model sees the element first and
/// the context after it:
///
/// ```text
/// <element fragment>
/// parent: <parent fragment>
/// sibling: <fragment> (up to 4)
/// child: <fragment> (subtree, depth 1)
/// ```
pub fn context_fragment(snapshot: &Snapshot, descriptor: &Descriptor, cap: usize) -> String {
    let mut out = element_fragment(descriptor);

    if let Some(parent) = snapshot.parent_of(descriptor.backend_id) {
        out.push_str("\nparent: ");
        out.push_str(&truncate(&element_fragment(parent), cap));
    }
    for sibling in snapshot
        .siblings_of(descriptor.backend_id)
        .into_iter()
        .take(MAX_CONTEXT_SIBLINGS)
    {
        out.push_str("\nsibling: ");
        out.push_str(&truncate(&element_fragment(sibling), cap));
    }
    for &child_id in snapshot.children_of(descriptor.backend_id) {
        if let Some(child) = snapshot.get(child_id) {
            out.push_str("\nchild: ");
            out.push_str(&truncate(&element_fragment(child), cap));
        }
    }
    out
}

fn truncate(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    text.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanonicalizeConfig;
    use crate::descriptor::{RawElement, RawSnapshot};
    use crate::pipeline::canonicalize;

    fn snapshot_with_family() -> Snapshot {
        let raw = RawSnapshot {
            origin: "https://x".into(),
            path: "/".into(),
            elements: vec![
                RawElement {
                    backend_id: Some(1),
                    tag: Some("form".into()),
                    ..Default::default()
                },
                RawElement {
                    backend_id: Some(2),
                    parent_id: Some(1),
                    tag: Some("input".into()),
                    attrs: [
                        ("placeholder".to_string(), "Email".to_string()),
                        ("type".to_string(), "email".to_string()),
                    ]
                    .into_iter()
                    .collect(),
                    ..Default::default()
                },
                RawElement {
                    backend_id: Some(3),
                    parent_id: Some(1),
                    tag: Some("button".into()),
                    text: Some("Sign in".into()),
                    ..Default::default()
                },
            ],
        };
        canonicalize(&raw, &CanonicalizeConfig::default()).unwrap()
    }

    #[test]
    fn element_fragment_renders_salient_attrs_in_fixed_order() {
        let snapshot = snapshot_with_family();
        let input = snapshot.get(2).unwrap();
        assert_eq!(
            element_fragment(input),
            r#"<input placeholder="Email" type="email"></input>"#
        );
    }

    #[test]
    fn equal_descriptors_render_equal_fragments() {
        let snapshot = snapshot_with_family();
        let a = element_fragment(snapshot.get(3).unwrap());
        let b = element_fragment(snapshot.get(3).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn context_includes_parent_and_siblings() {
        let snapshot = snapshot_with_family();
        let context = context_fragment(&snapshot, snapshot.get(3).unwrap(), 256);
        assert!(context.starts_with("<button>Sign in</button>"));
        assert!(context.contains("parent: <form>"));
        assert!(context.contains("sibling: <input"));
    }

    #[test]
    fn context_neighbors_are_truncated() {
        let snapshot = snapshot_with_family();
        let context = context_fragment(&snapshot, snapshot.get(3).unwrap(), 10);
        for line in context.lines().skip(1) {
            let body = line.splitn(2, ": ").nth(1).unwrap();
            assert!(body.chars().count() <= 10, "line too long: {line}");
        }
    }
}
