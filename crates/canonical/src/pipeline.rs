//! The canonicalization pipeline: raw browser records in, [`Snapshot`] out.
//!
//! Stages, in order:
//!
//! 1. Config validation and volatile-matcher compilation.
//! 2. Per-element normalization (tag lowercasing, whitespace collapse,
//!    text capping) with required-field checks.
//! 3. Frame grouping and `frame_hash` computation over child skeletons.
//! 4. `content_hash` per element over the stripped attribute view.
//! 5. Page-level identities: `page_signature` and `dom_hash`.

use std::collections::BTreeMap;

use sha1::{Digest as _, Sha1};
use tracing::debug;

use crate::config::CanonicalizeConfig;
use crate::descriptor::{Descriptor, RawSnapshot};
use crate::error::CanonicalError;
use crate::hash::{content_hash, dom_hash, page_signature, skeleton_record, Digest160};
use crate::snapshot::Snapshot;
use crate::volatile::VolatileMatcher;

/// Canonicalize one raw capture into an immutable [`Snapshot`].
///
/// Fails fast on malformed input: every element must carry `backend_id` and
/// `tag` (the minimum join key and identity the pipeline needs); an empty
/// element list is rejected outright.
pub fn canonicalize(
    raw: &RawSnapshot,
    config: &CanonicalizeConfig,
) -> Result<Snapshot, CanonicalError> {
    config.validate()?;
    let volatile = VolatileMatcher::new(&config.volatile_patterns)?;

    if raw.elements.is_empty() {
        return Err(CanonicalError::EmptySnapshot);
    }

    // Stage 2: normalize fields, keep document order.
    let mut partials = Vec::with_capacity(raw.elements.len());
    for (index, element) in raw.elements.iter().enumerate() {
        let backend_id = element
            .backend_id
            .ok_or(CanonicalError::MissingField { index, field: "backend_id" })?;
        let tag = element
            .tag
            .as_deref()
            .ok_or(CanonicalError::MissingField { index, field: "tag" })?
            .to_lowercase();
        let role = element.role.clone().unwrap_or_default();
        let raw_text = element.text.clone().unwrap_or_default();
        let text = collapse_whitespace(&raw_text, config.text_cap);

        partials.push(Partial {
            backend_id,
            parent_id: element.parent_id,
            tag,
            role,
            text,
            raw_text,
            attrs: element.attrs.clone(),
            frame_path: element.frame_path.clone(),
            in_shadow: element.in_shadow,
            visible: element.visible.unwrap_or(true),
            bbox: element.bbox,
        });
    }

    // Stage 3: one frame hash per distinct frame path, over the ordered
    // skeletons of the frame's own elements.
    let mut frame_hashes: Vec<(Vec<String>, Digest160)> = Vec::new();
    for partial in &partials {
        if !frame_hashes.iter().any(|(path, _)| path == &partial.frame_path) {
            let digest = hash_frame(config.version, &partial.frame_path, &partials, &volatile);
            frame_hashes.push((partial.frame_path.clone(), digest));
        }
    }
    let frame_of = |path: &Vec<String>| -> Digest160 {
        frame_hashes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| *d)
            .unwrap_or_default()
    };

    // Stages 4-5: content hashes and page identities. The page skeleton is
    // depth-limited to the top two tree levels so a logical page keeps its
    // signature while deep content (list rows, results) churns.
    let roots: std::collections::HashSet<u64> = partials
        .iter()
        .filter(|p| p.parent_id.is_none())
        .map(|p| p.backend_id)
        .collect();
    let in_skeleton = |p: &Partial| {
        p.parent_id.map(|parent| roots.contains(&parent)).unwrap_or(true)
    };

    let mut descriptors = Vec::with_capacity(partials.len());
    let mut skeleton = Sha1::new();
    for partial in partials {
        let stripped = stripped_attrs(&partial.attrs, &volatile);
        let digest = content_hash(
            config.version,
            &partial.tag,
            &partial.role,
            &stripped,
            &partial.text,
            &partial.frame_path,
        );
        if in_skeleton(&partial) {
            skeleton_record(
                &mut skeleton,
                &partial.tag,
                &partial.role,
                stripped.keys(),
            );
        }
        descriptors.push(Descriptor {
            backend_id: partial.backend_id,
            parent_id: partial.parent_id,
            frame_hash: frame_of(&partial.frame_path),
            tag: partial.tag,
            role: partial.role,
            text: partial.text,
            raw_text: partial.raw_text,
            attrs: partial.attrs,
            frame_path: partial.frame_path,
            in_shadow: partial.in_shadow,
            visible: partial.visible,
            bbox: partial.bbox,
            content_hash: digest,
        });
    }

    let dom_skeleton = Digest160(skeleton.finalize().into());
    let signature = page_signature(
        config.version,
        &raw.origin,
        &normalize_path(&raw.path),
        &dom_skeleton,
    );
    let dom = dom_hash(descriptors.iter().map(|d| d.content_hash));

    debug!(
        elements = descriptors.len(),
        frames = frame_hashes.len(),
        page = %signature,
        "canonicalized snapshot"
    );

    Ok(Snapshot::new(descriptors, signature, dom))
}

struct Partial {
    backend_id: u64,
    parent_id: Option<u64>,
    tag: String,
    role: String,
    text: String,
    raw_text: String,
    attrs: BTreeMap<String, String>,
    frame_path: Vec<String>,
    in_shadow: bool,
    visible: bool,
    bbox: Option<crate::descriptor::BoundingBox>,
}

/// Collapse runs of whitespace to single spaces, trim, cap at `cap` chars.
fn collapse_whitespace(text: &str, cap: usize) -> String {
    let mut out = String::with_capacity(text.len().min(cap));
    let mut count = 0usize;
    for word in text.split_whitespace() {
        if count > 0 {
            if count + 1 > cap {
                break;
            }
            out.push(' ');
            count += 1;
        }
        for ch in word.chars() {
            if count >= cap {
                return out;
            }
            out.push(ch);
            count += 1;
        }
    }
    out
}

/// Trim trailing slashes and drop query/fragment from the page path.
fn normalize_path(path: &str) -> String {
    let cut = path
        .find(['?', '#'])
        .map(|at| &path[..at])
        .unwrap_or(path);
    let trimmed = cut.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn stripped_attrs(
    attrs: &BTreeMap<String, String>,
    volatile: &VolatileMatcher,
) -> BTreeMap<String, String> {
    attrs
        .iter()
        .filter(|(key, value)| !volatile.attr_is_volatile(key, value))
        .map(|(key, value)| {
            // Keep only the stable class tokens so a volatile suffix cannot
            // shift the hash.
            if key == "class" {
                (
                    key.clone(),
                    volatile.stable_class_tokens(value).join(" "),
                )
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

fn hash_frame(
    version: u32,
    frame_path: &[String],
    partials: &[Partial],
    volatile: &VolatileMatcher,
) -> Digest160 {
    let children: Vec<(String, String, Vec<String>)> = partials
        .iter()
        .filter(|p| p.frame_path == frame_path)
        .map(|p| {
            let keys = stripped_attrs(&p.attrs, volatile)
                .keys()
                .cloned()
                .collect();
            (p.tag.clone(), p.role.clone(), keys)
        })
        .collect();
    crate::hash::frame_hash(version, &children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RawElement;

    fn raw_button(backend_id: u64, text: &str) -> RawElement {
        RawElement {
            backend_id: Some(backend_id),
            tag: Some("button".into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn one_page(elements: Vec<RawElement>) -> RawSnapshot {
        RawSnapshot {
            origin: "https://app.example.com".into(),
            path: "/login".into(),
            elements,
        }
    }

    #[test]
    fn missing_backend_id_is_fatal() {
        let raw = one_page(vec![RawElement {
            tag: Some("div".into()),
            ..Default::default()
        }]);
        assert_eq!(
            canonicalize(&raw, &CanonicalizeConfig::default()),
            Err(CanonicalError::MissingField { index: 0, field: "backend_id" })
        );
    }

    #[test]
    fn missing_tag_is_fatal() {
        let raw = one_page(vec![RawElement {
            backend_id: Some(1),
            ..Default::default()
        }]);
        assert_eq!(
            canonicalize(&raw, &CanonicalizeConfig::default()),
            Err(CanonicalError::MissingField { index: 0, field: "tag" })
        );
    }

    #[test]
    fn empty_snapshot_is_fatal() {
        let raw = one_page(vec![]);
        assert_eq!(
            canonicalize(&raw, &CanonicalizeConfig::default()),
            Err(CanonicalError::EmptySnapshot)
        );
    }

    #[test]
    fn text_is_collapsed_and_capped() {
        let config = CanonicalizeConfig::default().with_text_cap(8);
        let raw = one_page(vec![raw_button(1, "  Sign \n\t  In  now please ")]);
        let snapshot = canonicalize(&raw, &config).unwrap();
        assert_eq!(snapshot.descriptors[0].text, "Sign In");
        assert_eq!(
            snapshot.descriptors[0].raw_text,
            "  Sign \n\t  In  now please "
        );
    }

    #[test]
    fn tags_are_lowercased() {
        let raw = one_page(vec![RawElement {
            backend_id: Some(1),
            tag: Some("BUTTON".into()),
            ..Default::default()
        }]);
        let snapshot = canonicalize(&raw, &CanonicalizeConfig::default()).unwrap();
        assert_eq!(snapshot.descriptors[0].tag, "button");
    }

    #[test]
    fn volatile_id_does_not_shift_content_hash() {
        let mut with_volatile = raw_button(1, "Go");
        with_volatile
            .attrs
            .insert("id".into(), "btn-9f3a2c".into());
        let plain = raw_button(1, "Go");

        let a = canonicalize(&one_page(vec![with_volatile]), &CanonicalizeConfig::default())
            .unwrap();
        let b = canonicalize(&one_page(vec![plain]), &CanonicalizeConfig::default()).unwrap();
        assert_eq!(
            a.descriptors[0].content_hash,
            b.descriptors[0].content_hash
        );
        // The volatile attribute itself is retained for scoring.
        assert_eq!(a.descriptors[0].attr("id"), Some("btn-9f3a2c"));
    }

    #[test]
    fn stable_id_does_shift_content_hash() {
        let mut with_id = raw_button(1, "Go");
        with_id.attrs.insert("id".into(), "submit-order".into());
        let plain = raw_button(1, "Go");

        let a = canonicalize(&one_page(vec![with_id]), &CanonicalizeConfig::default()).unwrap();
        let b = canonicalize(&one_page(vec![plain]), &CanonicalizeConfig::default()).unwrap();
        assert_ne!(
            a.descriptors[0].content_hash,
            b.descriptors[0].content_hash
        );
    }

    #[test]
    fn custom_volatile_patterns_are_honored() {
        let config = CanonicalizeConfig::default()
            .with_volatile_patterns(vec![r"^gen-\d+$".into()]);
        let mut element = raw_button(1, "Go");
        element.attrs.insert("id".into(), "gen-42".into());
        let baseline = raw_button(1, "Go");

        let a = canonicalize(&one_page(vec![element]), &config).unwrap();
        let b = canonicalize(&one_page(vec![baseline]), &config).unwrap();
        assert_eq!(
            a.descriptors[0].content_hash,
            b.descriptors[0].content_hash
        );
    }

    #[test]
    fn page_signature_ignores_query_and_trailing_slash() {
        let base = one_page(vec![raw_button(1, "Go")]);
        let mut with_query = base.clone();
        with_query.path = "/login/?next=%2Fhome#top".into();
        let mut other_page = base.clone();
        other_page.path = "/settings".into();

        let config = CanonicalizeConfig::default();
        let a = canonicalize(&base, &config).unwrap();
        let b = canonicalize(&with_query, &config).unwrap();
        let c = canonicalize(&other_page, &config).unwrap();
        assert_eq!(a.page_signature, b.page_signature);
        assert_ne!(a.page_signature, c.page_signature);
    }

    #[test]
    fn frame_hash_is_stable_across_text_edits() {
        let config = CanonicalizeConfig::default();
        let a = canonicalize(&one_page(vec![raw_button(1, "Sign In")]), &config).unwrap();
        let b = canonicalize(&one_page(vec![raw_button(1, "Sign Out")]), &config).unwrap();
        // Same skeleton (tags + attr keys), different text: frame identity holds.
        assert_eq!(a.descriptors[0].frame_hash, b.descriptors[0].frame_hash);
        assert_ne!(a.descriptors[0].content_hash, b.descriptors[0].content_hash);
    }

    #[test]
    fn frame_hash_changes_when_skeleton_changes() {
        let config = CanonicalizeConfig::default();
        let a = canonicalize(&one_page(vec![raw_button(1, "Go")]), &config).unwrap();
        let b = canonicalize(
            &one_page(vec![raw_button(1, "Go"), raw_button(2, "Stop")]),
            &config,
        )
        .unwrap();
        assert_ne!(a.descriptors[0].frame_hash, b.descriptors[0].frame_hash);
    }

    #[test]
    fn deep_additions_keep_page_signature() {
        let config = CanonicalizeConfig::default();
        let container = RawElement {
            backend_id: Some(1),
            tag: Some("div".into()),
            ..Default::default()
        };
        let list = RawElement {
            backend_id: Some(2),
            parent_id: Some(1),
            tag: Some("ul".into()),
            ..Default::default()
        };
        let item = |id: u64, text: &str| RawElement {
            backend_id: Some(id),
            parent_id: Some(2),
            tag: Some("li".into()),
            text: Some(text.into()),
            ..Default::default()
        };

        let before = one_page(vec![container.clone(), list.clone(), item(3, "One")]);
        let after = one_page(vec![
            container,
            list,
            item(3, "One"),
            item(4, "Two"),
            item(5, "Three"),
        ]);
        let a = canonicalize(&before, &config).unwrap();
        let b = canonicalize(&after, &config).unwrap();
        // Depth-2 churn: signature holds, whole-DOM hash moves.
        assert_eq!(a.page_signature, b.page_signature);
        assert_ne!(a.dom_hash, b.dom_hash);
    }

    #[test]
    fn topology_lookups_work() {
        let parent = RawElement {
            backend_id: Some(1),
            tag: Some("form".into()),
            ..Default::default()
        };
        let child_a = RawElement {
            backend_id: Some(2),
            parent_id: Some(1),
            tag: Some("input".into()),
            ..Default::default()
        };
        let child_b = RawElement {
            backend_id: Some(3),
            parent_id: Some(1),
            tag: Some("button".into()),
            ..Default::default()
        };
        let snapshot = canonicalize(
            &one_page(vec![parent, child_a, child_b]),
            &CanonicalizeConfig::default(),
        )
        .unwrap();

        assert_eq!(snapshot.children_of(1), &[2, 3]);
        assert_eq!(snapshot.parent_of(2).unwrap().backend_id, 1);
        let siblings = snapshot.siblings_of(2);
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].backend_id, 3);
        assert_eq!(snapshot.doc_order(3), Some(2));
    }

    #[test]
    fn identical_captures_produce_identical_snapshots() {
        let raw = one_page(vec![raw_button(1, "Sign In"), raw_button(2, "Help")]);
        let config = CanonicalizeConfig::default();
        let a = canonicalize(&raw, &config).unwrap();
        let b = canonicalize(&raw, &config).unwrap();
        assert_eq!(a.dom_hash, b.dom_hash);
        assert_eq!(a.page_signature, b.page_signature);
        assert_eq!(a.descriptors, b.descriptors);
    }
}
