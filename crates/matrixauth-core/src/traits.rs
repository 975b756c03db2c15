//! Core traits for the matrix authorization engine.
//!
//! These are the contracts the scope adapters implement. Any type that
//! answers "does this sid hold this permission" is an `Acl`; any scope that
//! owns a matrix is an `AuthorizationContainer`.

use std::sync::Arc;

use matrixauth_contracts::{
    authentication::Authentication,
    decision::Decision,
    entry::PermissionEntry,
    error::MatrixAuthResult,
    permission::{Permission, PermissionScope},
};

use crate::matrix::AuthorizationMatrix;

/// A decision function over `(sid, permission, principal)`.
///
/// `principal` is true when `sid` is tested as a user identity and false
/// when it is tested as one of the caller's groups.
pub trait Acl: Send + Sync {
    fn decide(&self, sid: &str, permission: &Permission, principal: bool) -> Decision;

    fn has_permission(&self, sid: &str, permission: &Permission, principal: bool) -> bool {
        self.decide(sid, permission, principal).is_granted()
    }

    /// Test the caller's user sid, then each of its groups.
    ///
    /// Composite ACLs whose combination does not distribute over identities
    /// override this.
    fn is_granted(&self, authentication: &Authentication, permission: &Permission) -> bool {
        self.has_permission(authentication.name(), permission, true)
            || authentication
                .groups()
                .iter()
                .any(|group| self.has_permission(group, permission, false))
    }
}

impl<T: Acl + ?Sized> Acl for Arc<T> {
    fn decide(&self, sid: &str, permission: &Permission, principal: bool) -> Decision {
        (**self).decide(sid, permission, principal)
    }

    fn is_granted(&self, authentication: &Authentication, permission: &Permission) -> bool {
        (**self).is_granted(authentication, permission)
    }
}

/// A scope that owns an authorization matrix.
pub trait AuthorizationContainer: Send + Sync {
    /// The current matrix snapshot.
    fn matrix(&self) -> Arc<AuthorizationMatrix>;

    /// The permission scope grants on this container must be contained by.
    fn permission_scope(&self) -> PermissionScope;

    /// Add one grant after load.
    ///
    /// # Errors
    ///
    /// Returns `MatrixAuthError::InapplicablePermission` if `permission`
    /// does not apply to this container's scope.
    fn grant(&self, permission: &Permission, entry: PermissionEntry) -> MatrixAuthResult<()>;

    /// Return true if `entry` is granted `permission` exactly, ignoring
    /// implication and compatible types.
    fn has_explicit_entry(&self, entry: &PermissionEntry, permission: &Permission) -> bool {
        self.matrix().has_explicit_entry(entry, permission)
    }
}
