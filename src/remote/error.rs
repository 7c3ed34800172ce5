//! Control-plane client errors.

/// Error talking to the remote control plane.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The named resource does not exist remotely.
    #[error("resource '{name}' not found")]
    NotFound { name: String },

    /// The lock token was stale: another writer changed the resource
    /// between our read and our write.
    #[error("conflicting operation: lock token is stale")]
    ConflictingOperation,

    /// The control plane rejected the request body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The declared capacity cannot hold the submitted rules.
    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    /// Transport or service failure.
    #[error("remote call failed: {0}")]
    Remote(String),
}

impl ClientError {
    /// Whether retrying the same call with a fresh lock token can
    /// succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictingOperation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(ClientError::ConflictingOperation.is_retryable());
        assert!(!ClientError::NotFound {
            name: "acl".to_string()
        }
        .is_retryable());
        assert!(!ClientError::InvalidRequest("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ClientError::NotFound {
            name: "edge-acl".to_string(),
        };
        assert_eq!(err.to_string(), "resource 'edge-acl' not found");
    }
}
