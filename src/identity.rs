//! Node identity for external diffing.
//!
//! Statement nodes have no natural key, so their identity is a content
//! hash of the canonical wire form: equal content means equal identity,
//! and a diff engine collapses equal-hash subtrees without walking
//! them. Rules and top-level resources are keyed by name instead. The
//! hash is computed on demand from the current wire form, never stored,
//! so it cannot go stale after an edit.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::acl::{RuleGroup, WebAcl};
use crate::rule::Rule;
use crate::statement::{FieldToMatch, Statement, TextTransformation};

/// Failed to derive a node identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The wire form could not be serialized for hashing.
    #[error("failed to serialize node for hashing: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// SHA-256 over the canonical wire serialization of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Lowercase hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a wire-form value. Canonical because wire structs serialize
/// their fields in declaration order and omit absent optionals.
///
/// # Errors
///
/// Fails when the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> Result<ContentHash, IdentityError> {
    let bytes = serde_json::to_vec(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(ContentHash(hex::encode(digest)))
}

/// How a node is identified when two trees are compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKey {
    /// A name the user controls; stable across content edits.
    Natural(String),
    /// Content-derived; changes whenever the subtree changes.
    Content(ContentHash),
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Natural(name) => f.write_str(name),
            Self::Content(hash) => write!(f, "sha256:{hash}"),
        }
    }
}

/// Anything with a diffable identity.
pub trait Identified {
    /// The node's identity key.
    ///
    /// # Errors
    ///
    /// Fails when a content-keyed node cannot be serialized.
    fn node_key(&self) -> Result<NodeKey, IdentityError>;
}

impl Identified for Statement {
    fn node_key(&self) -> Result<NodeKey, IdentityError> {
        Ok(NodeKey::Content(content_hash(&self.to_wire())?))
    }
}

impl Identified for FieldToMatch {
    fn node_key(&self) -> Result<NodeKey, IdentityError> {
        Ok(NodeKey::Content(content_hash(&self.to_wire())?))
    }
}

impl Identified for TextTransformation {
    fn node_key(&self) -> Result<NodeKey, IdentityError> {
        Ok(NodeKey::Content(content_hash(&self.to_wire())?))
    }
}

impl Identified for Rule {
    fn node_key(&self) -> Result<NodeKey, IdentityError> {
        Ok(NodeKey::Natural(self.name.clone()))
    }
}

impl Identified for WebAcl {
    fn node_key(&self) -> Result<NodeKey, IdentityError> {
        Ok(NodeKey::Natural(self.name.clone()))
    }
}

impl Identified for RuleGroup {
    fn node_key(&self) -> Result<NodeKey, IdentityError> {
        Ok(NodeKey::Natural(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{
        ByteMatchStatement, FieldToMatch, PositionalConstraint, TextTransformation,
        TransformationKind,
    };

    fn byte_match(search: &str) -> Statement {
        Statement::ByteMatch(ByteMatchStatement {
            field_to_match: FieldToMatch::UriPath,
            positional_constraint: PositionalConstraint::Contains,
            search_string: search.to_string(),
            text_transformations: vec![TextTransformation::new(0, TransformationKind::None)],
        })
    }

    #[test]
    fn test_equal_content_equal_hash() {
        let a = byte_match("/admin").node_key().unwrap();
        let b = byte_match("/admin").node_key().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(
            byte_match("/admin").node_key().unwrap(),
            byte_match("/login").node_key().unwrap()
        );
    }

    #[test]
    fn test_leaf_edit_changes_ancestor_hash() {
        let before = Statement::and(vec![byte_match("/admin"), byte_match("/internal")]);
        let after = Statement::and(vec![byte_match("/admin"), byte_match("/changed")]);
        assert_ne!(before.node_key().unwrap(), after.node_key().unwrap());
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let key = byte_match("x").node_key().unwrap();
        let NodeKey::Content(hash) = key else {
            panic!("statements are content-keyed");
        };
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_rule_keyed_by_name_not_content() {
        use crate::rule::{RuleAction, VisibilityConfig};
        let mut rule = crate::rule::Rule {
            name: "block-admin".to_string(),
            priority: 0,
            statement: byte_match("/admin"),
            action: Some(RuleAction::Block),
            override_action: None,
            rule_labels: Vec::new(),
            visibility_config: VisibilityConfig::disabled("block-admin"),
        };
        let before = rule.node_key().unwrap();
        rule.statement = byte_match("/changed");
        assert_eq!(before, rule.node_key().unwrap());
        assert_eq!(before, NodeKey::Natural("block-admin".to_string()));
    }

    #[test]
    fn test_display_prefixes_content_keys() {
        let key = byte_match("x").node_key().unwrap();
        assert!(key.to_string().starts_with("sha256:"));
    }
}
