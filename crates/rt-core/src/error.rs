//! Error type shared by every fallible rule-tree operation.

use crate::id::NodeId;
use thiserror::Error;

/// Failures surfaced to the caller. None of them are fatal: the caller keeps
/// its last valid canonical tree and may retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The text is not well-formed JSON.
    #[error("invalid JSON: {0}")]
    Syntax(String),

    /// The parsed object does not have the shape of a rule tree.
    #[error("invalid tree structure at `{path}`: {message}")]
    Validation { path: String, message: String },

    #[error("duplicate node id `{0}`")]
    DuplicateId(NodeId),

    #[error("node id `{0}` is reserved")]
    ReservedId(NodeId),

    /// The flattened form is internally inconsistent.
    #[error("inconsistent flattened tree: {0}")]
    Structure(String),

    /// A move addressed a parent or position that does not exist.
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// A mutation would break the tree invariants (cycle, second root).
    #[error("structural invariant violation: {0}")]
    StructuralViolation(String),

    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl TreeError {
    pub(crate) fn validation(path: &str, message: impl Into<String>) -> Self {
        TreeError::Validation {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Result alias for rule-tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
