use thiserror::Error;

/// Errors from selector synthesis and verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthError {
    /// Every strategy produced a non-unique (or no) selector.
    #[error("no strategy produced a unique selector for element {backend_id}")]
    Exhausted { backend_id: u64 },
    /// The chosen element is not in the snapshot (caller bug).
    #[error("element {backend_id} not present in snapshot")]
    UnknownElement { backend_id: u64 },
    /// An absolute path could not be rewritten to a relative one.
    #[error("absolute xpath cannot be made relative: {0}")]
    AbsolutePath(String),
    /// The expression uses syntax outside the supported subset.
    #[error("unsupported xpath syntax: {0}")]
    UnsupportedSyntax(String),
}
