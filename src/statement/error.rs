//! Statement decode errors and node paths.

use thiserror::Error;

/// Path to a node inside an aggregate's statement tree.
///
/// Paths read like `rules[2].Statement.AndStatement.Statements[1]` and
/// are carried through the depth-first decode so a failure identifies
/// the owning rule and the exact failing node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath(String);

impl NodePath {
    /// Create a path rooted at the given segment.
    #[must_use]
    pub fn root(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Append a named child segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}.{}", self.0, segment))
    }

    /// Append an indexed child segment.
    #[must_use]
    pub fn index(&self, segment: &str, idx: usize) -> Self {
        Self(format!("{}.{}[{}]", self.0, segment, idx))
    }

    /// The rendered path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while decoding a wire payload into the statement tree.
///
/// A decode error is fatal for the refresh of the owning aggregate; it
/// is never retried and never silently dropped, since dropping a
/// predicate would silently weaken a security rule.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The wire object populated none of the statement alternatives.
    #[error("no statement alternative populated at {path}")]
    NoAlternative {
        /// Path to the failing node.
        path: NodePath,
    },

    /// A field-to-match selected none of its alternatives.
    #[error("no field-to-match alternative populated at {path}")]
    NoFieldToMatch {
        /// Path to the failing node.
        path: NodePath,
    },

    /// A required name attribute was missing or empty.
    #[error("empty name for {kind} at {path}")]
    EmptyName {
        /// Which wire object carried the empty name.
        kind: &'static str,
        /// Path to the failing node.
        path: NodePath,
    },

    /// The wire payload is structurally malformed.
    #[error("malformed wire payload at {path}: {message}")]
    Malformed {
        /// Path to the failing node.
        path: NodePath,
        /// What was wrong.
        message: String,
    },
}

/// Result type for statement decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_building() {
        let path = NodePath::root("rules[2]")
            .child("Statement")
            .child("AndStatement")
            .index("Statements", 1);
        assert_eq!(
            path.as_str(),
            "rules[2].Statement.AndStatement.Statements[1]"
        );
    }

    #[test]
    fn test_error_display_carries_path() {
        let err = DecodeError::NoAlternative {
            path: NodePath::root("rules[0]").child("Statement"),
        };
        assert!(err.to_string().contains("rules[0].Statement"));
    }
}
