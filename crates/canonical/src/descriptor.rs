//! Canonical element records and the raw browser input they are built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hash::Digest160;

/// Pixel rectangle from the layout tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One raw element record as captured by the browser collaborator: DOM and
/// accessibility fields already joined by `backend_id`. Everything except
/// `backend_id` and `tag` is optional; the canonicalizer fills defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawElement {
    pub backend_id: Option<u64>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub tag: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub frame_path: Vec<String>,
    #[serde(default)]
    pub in_shadow: bool,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

/// A raw capture: page coordinates plus the flat element list in document
/// order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawSnapshot {
    pub origin: String,
    pub path: String,
    pub elements: Vec<RawElement>,
}

/// Canonical representation of one DOM element within a snapshot.
///
/// Descriptors are value objects: produced once per capture, never mutated,
/// safe to share across threads by immutable handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Stable identifier within the snapshot.
    pub backend_id: u64,
    /// Parent element, when the browser reported one.
    pub parent_id: Option<u64>,
    /// Lowercase element tag.
    pub tag: String,
    /// Accessibility role; empty when the ax tree carried none.
    pub role: String,
    /// Normalized visible text: whitespace-collapsed, capped at
    /// `CanonicalizeConfig::text_cap` characters.
    pub text: String,
    /// The original uncapped text. Side channel only; never hashed.
    pub raw_text: String,
    /// Attribute map, key-sorted. Volatile attributes are retained here for
    /// scoring but excluded from every hash input.
    pub attrs: BTreeMap<String, String>,
    /// Frame identifiers from the root frame to this element's frame.
    pub frame_path: Vec<String>,
    /// Identity of this element's frame skeleton.
    pub frame_hash: Digest160,
    /// Whether the element lives inside a shadow root.
    pub in_shadow: bool,
    /// Visibility verdict from the accessibility/visibility heuristics.
    pub visible: bool,
    /// Layout rectangle, when captured.
    pub bbox: Option<BoundingBox>,
    /// Content identity over `(tag, role, stripped attrs, text, frame_path)`.
    pub content_hash: Digest160,
}

impl Descriptor {
    /// Attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Whether the element is disabled per DOM or ARIA state.
    pub fn is_disabled(&self) -> bool {
        self.attrs.contains_key("disabled")
            || self.attr("aria-disabled") == Some("true")
    }

    /// Depth of the frame path; the root document has depth 0.
    pub fn frame_depth(&self) -> usize {
        self.frame_path.len()
    }
}
