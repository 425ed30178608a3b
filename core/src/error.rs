use thiserror::Error;

use crate::dom::NodeId;

/// Failures raised while searching or splicing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FinderError {
    #[error("pattern `{pattern}` can produce zero-length matches")]
    InvalidPattern { pattern: String },

    #[error("invalid regex `{pattern}`: {message}")]
    Regex { pattern: String, message: String },

    #[error("match {index} spans {start}..{end} but only {len} bytes of text are visible")]
    OffsetOutOfRange {
        index: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("cannot splice with a text node as the root; pass its parent element")]
    UnsupportedRoot,

    #[error("node {0} is not attached to a parent")]
    Detached(NodeId),
}

/// Failures raised while loading rule lists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule {index} is malformed: {reason}")]
    MalformedRule { index: usize, reason: String },

    #[error("failed to parse rule list: {0}")]
    Parse(String),
}
