//! Identity hashing for descriptors, frames, pages, and snapshots.
//!
//! # Hash algorithms
//!
//! The per-element, per-frame, and per-page identities are 160-bit SHA-1
//! digests. Collisions here cost a cache miss or a promotion miss, never
//! correctness, so SHA-1-grade strength is sufficient and keeps rows at a
//! fixed 20 bytes. The whole-snapshot `dom_hash` is SHA-256 over the ordered
//! content hashes.
//!
//! # Serialization discipline
//!
//! Every digest starts with the canonicalizer version (big-endian) and a
//! discriminator byte, so the same field bytes can never collide across hash
//! kinds or across canonicalizer versions:
//!
//! ```text
//! content_hash    SHA-1(version || 0x00 || tag 1F role 1F attrs 1F text 1F frame_path)
//! frame_hash      SHA-1(version || 0x01 || child skeletons)
//! page_signature  SHA-1(version || 0x02 || origin 1F path 1F skeleton_hash)
//! label_digest    SHA-1(version || 0x03 || tokens)
//! ```
//!
//! Fields are joined with the ASCII unit separator (`0x1F`) and records with
//! the record separator (`0x1E`); neither byte survives text normalization,
//! so the serialization is unambiguous.

use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

const UNIT_SEP: u8 = 0x1f;
const RECORD_SEP: u8 = 0x1e;

const KIND_CONTENT: u8 = 0x00;
const KIND_FRAME: u8 = 0x01;
const KIND_PAGE: u8 = 0x02;
const KIND_LABEL: u8 = 0x03;
const KIND_FRAME_IDENTITY: u8 = 0x04;

/// A 160-bit identity digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Digest160(pub [u8; 20]);

impl Digest160 {
    /// Hex rendering for logs and diagnostics.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Digest160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest160({})", self.to_hex())
    }
}

impl fmt::Display for Digest160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 256-bit whole-snapshot digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Digest256(pub [u8; 32]);

impl Digest256 {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest256({})", self.to_hex())
    }
}

fn sha1_digest(version: u32, kind: u8, feed: impl FnOnce(&mut Sha1)) -> Digest160 {
    let mut hasher = Sha1::new();
    hasher.update(version.to_be_bytes());
    hasher.update([kind]);
    feed(&mut hasher);
    Digest160(hasher.finalize().into())
}

/// Compute the content identity of one element.
///
/// Only canonical, non-volatile fields participate: tag, role, the stripped
/// attribute map in key order, the capped visible text, and the frame path.
pub fn content_hash(
    version: u32,
    tag: &str,
    role: &str,
    stripped_attrs: &BTreeMap<String, String>,
    text: &str,
    frame_path: &[String],
) -> Digest160 {
    sha1_digest(version, KIND_CONTENT, |h| {
        h.update(tag.as_bytes());
        h.update([UNIT_SEP]);
        h.update(role.as_bytes());
        h.update([UNIT_SEP]);
        for (key, value) in stripped_attrs {
            h.update(key.as_bytes());
            h.update([UNIT_SEP]);
            h.update(value.as_bytes());
            h.update([RECORD_SEP]);
        }
        h.update([UNIT_SEP]);
        h.update(text.as_bytes());
        h.update([UNIT_SEP]);
        for segment in frame_path {
            h.update(segment.as_bytes());
            h.update([RECORD_SEP]);
        }
    })
}

/// One element's contribution to its frame skeleton: tag, role, and the
/// stripped attribute keys (values excluded, so text edits inside a frame do
/// not change the frame's identity).
pub(crate) fn skeleton_record(
    hasher: &mut Sha1,
    tag: &str,
    role: &str,
    stripped_attr_keys: impl Iterator<Item = impl AsRef<str>>,
) {
    hasher.update(tag.as_bytes());
    hasher.update([UNIT_SEP]);
    hasher.update(role.as_bytes());
    hasher.update([UNIT_SEP]);
    for key in stripped_attr_keys {
        hasher.update(key.as_ref().as_bytes());
        hasher.update([RECORD_SEP]);
    }
    hasher.update([RECORD_SEP]);
}

/// Compute a frame's identity from its ordered child skeletons.
pub fn frame_hash(
    version: u32,
    children: &[(String, String, Vec<String>)], // (tag, role, stripped attr keys)
) -> Digest160 {
    sha1_digest(version, KIND_FRAME, |h| {
        for (tag, role, keys) in children {
            skeleton_record(h, tag, role, keys.iter());
        }
    })
}

/// Compute the logical-page identity used to scope promotions.
pub fn page_signature(
    version: u32,
    origin: &str,
    normalized_path: &str,
    dom_skeleton_hash: &Digest160,
) -> Digest160 {
    sha1_digest(version, KIND_PAGE, |h| {
        h.update(origin.as_bytes());
        h.update([UNIT_SEP]);
        h.update(normalized_path.as_bytes());
        h.update([UNIT_SEP]);
        h.update(dom_skeleton_hash.0);
    })
}

/// Stable identity of a frame across snapshots: its path alone.
///
/// `frame_hash` tracks the frame's skeleton and therefore moves when
/// elements come and go; the identity digest is what index reuse keys on,
/// so a three-element delta still finds the index it can update in place.
pub fn frame_identity(frame_path: &[String]) -> Digest160 {
    sha1_digest(1, KIND_FRAME_IDENTITY, |h| {
        for segment in frame_path {
            h.update(segment.as_bytes());
            h.update([RECORD_SEP]);
        }
    })
}

/// Hash normalized intent-target tokens into a 160-bit label key.
pub fn label_digest<'a>(tokens: impl Iterator<Item = &'a str>) -> Digest160 {
    sha1_digest(1, KIND_LABEL, |h| {
        for token in tokens {
            h.update(token.as_bytes());
            h.update([UNIT_SEP]);
        }
    })
}

/// Hash every content hash, in document order, into the snapshot identity.
pub fn dom_hash(content_hashes: impl Iterator<Item = Digest160>) -> Digest256 {
    let mut hasher = Sha256::new();
    for digest in content_hashes {
        hasher.update(digest.0);
    }
    Digest256(hasher.finalize().into())
}
