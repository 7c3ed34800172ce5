//! Remote control-plane protocol.
//!
//! The control plane owns the authoritative copy of every resource and
//! guards writes with optimistic locking: each read returns an opaque
//! lock token, and each write must present the token from the read it
//! was based on. A stale token fails with a conflict; the protocol here
//! re-reads and retries exactly once, then gives up.

mod error;

pub use error::ClientError;

use crate::acl::Scope;

/// Server-assigned identity of a created resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    /// Opaque resource id.
    pub id: String,
    /// Full resource ARN, used by cross-resource references.
    pub arn: String,
}

/// A resource as read from the control plane.
#[derive(Debug, Clone)]
pub struct RemoteResource<W> {
    pub identity: RemoteIdentity,
    /// Token to present with the next write.
    pub lock_token: String,
    /// The resource body in wire form.
    pub body: W,
}

/// Where a declared resource stands relative to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// User-authored, no remote identity yet.
    Unconfigured,
    /// Exists remotely; capacity is recorded at creation and immutable.
    Created {
        identity: RemoteIdentity,
        capacity: u64,
    },
    /// Exists remotely but the local declaration has diverged from the
    /// last-known remote state.
    Modified {
        identity: RemoteIdentity,
        capacity: u64,
    },
    /// Deleted remotely at our request.
    Deleted,
}

impl ResourceState {
    /// Whether the resource exists on the control plane.
    #[must_use]
    pub fn exists(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Modified { .. })
    }

    /// Whether a push is needed to converge.
    #[must_use]
    pub fn needs_push(&self) -> bool {
        matches!(self, Self::Unconfigured | Self::Modified { .. })
    }

    /// The remote identity, when the resource exists.
    #[must_use]
    pub fn identity(&self) -> Option<&RemoteIdentity> {
        match self {
            Self::Created { identity, .. } | Self::Modified { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// The capacity recorded at creation, when the resource exists.
    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        match self {
            Self::Created { capacity, .. } | Self::Modified { capacity, .. } => Some(*capacity),
            _ => None,
        }
    }

    /// Mark the local declaration as diverged from the remote copy.
    #[must_use]
    pub fn mark_modified(self) -> Self {
        match self {
            Self::Created { identity, capacity } => Self::Modified { identity, capacity },
            other => other,
        }
    }

    /// Record a successful push: a modified resource is in sync again.
    #[must_use]
    pub fn mark_pushed(self) -> Self {
        match self {
            Self::Modified { identity, capacity } => Self::Created { identity, capacity },
            other => other,
        }
    }
}

/// Client operations against one resource kind on the control plane.
///
/// `W` is the wire form of the resource body. Implementations do the
/// transport; the retry protocol lives in [`apply_update`] and
/// [`apply_delete`] so every caller gets the same conflict handling.
pub trait ControlPlane<W> {
    /// Read the named resource, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails on transport or service errors.
    fn describe(&self, name: &str, scope: Scope) -> Result<Option<RemoteResource<W>>, ClientError>;

    /// Create the resource.
    ///
    /// # Errors
    ///
    /// Fails when the resource already exists or the body is rejected.
    fn create(&self, name: &str, scope: Scope, body: &W) -> Result<RemoteIdentity, ClientError>;

    /// Overwrite the resource, presenting the lock token from the read
    /// this write is based on.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::ConflictingOperation`] when the token
    /// is stale.
    fn update(&self, name: &str, scope: Scope, body: &W, lock_token: &str)
        -> Result<(), ClientError>;

    /// Delete the resource, presenting a current lock token.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::ConflictingOperation`] when the token
    /// is stale.
    fn delete(&self, name: &str, scope: Scope, lock_token: &str) -> Result<(), ClientError>;
}

/// Push the declared body, creating or updating as needed.
///
/// On a stale-token conflict the resource is re-read for a fresh token
/// and the update retried once. A second conflict is returned to the
/// caller: two consecutive losses mean an active concurrent writer, and
/// looping against one is worse than surfacing it.
///
/// # Errors
///
/// Fails on transport errors, on rejection of the body, or on a second
/// consecutive conflict.
pub fn apply_update<W, P: ControlPlane<W>>(
    plane: &P,
    name: &str,
    scope: Scope,
    body: &W,
) -> Result<RemoteIdentity, ClientError> {
    let Some(current) = plane.describe(name, scope)? else {
        tracing::debug!(name, %scope, "resource absent, creating");
        return plane.create(name, scope, body);
    };

    match plane.update(name, scope, body, &current.lock_token) {
        Err(ClientError::ConflictingOperation) => {
            tracing::debug!(name, %scope, "stale lock token, re-reading and retrying once");
            let refreshed = plane
                .describe(name, scope)?
                .ok_or_else(|| ClientError::NotFound {
                    name: name.to_string(),
                })?;
            plane.update(name, scope, body, &refreshed.lock_token)?;
        }
        other => other?,
    }
    Ok(current.identity)
}

/// Delete the resource, tolerating one stale-token conflict.
///
/// # Errors
///
/// Fails on transport errors or on a second consecutive conflict. A
/// resource that is already gone is success, not an error.
pub fn apply_delete<W, P: ControlPlane<W>>(
    plane: &P,
    name: &str,
    scope: Scope,
) -> Result<(), ClientError> {
    let Some(current) = plane.describe(name, scope)? else {
        tracing::debug!(name, %scope, "resource already absent, nothing to delete");
        return Ok(());
    };

    match plane.delete(name, scope, &current.lock_token) {
        Err(ClientError::ConflictingOperation) => {
            tracing::debug!(name, %scope, "stale lock token on delete, retrying once");
            let Some(refreshed) = plane.describe(name, scope)? else {
                return Ok(());
            };
            plane.delete(name, scope, &refreshed.lock_token)?;
        }
        other => other?,
    }
    Ok(())
}
