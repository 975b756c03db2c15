//! Scope-kind adapters.
//!
//! Each scope kind (folder, job, agent) owns one matrix and one inheritance
//! strategy. The kinds share no base type; they implement the same
//! `AuthorizationContainer` and `InheritingContainer` capabilities over a
//! common `ScopeProperty` state.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, trace};

use matrixauth_contracts::{
    authentication::Authentication,
    decision::Decision,
    entry::PermissionEntry,
    error::{MatrixAuthError, MatrixAuthResult},
    permission::{Permission, PermissionScope},
};
use matrixauth_core::{
    matrix::{AuthorizationMatrix, MatrixCell},
    traits::{Acl, AuthorizationContainer},
};

use crate::strategy::{InheritanceOptions, InheritanceStrategy, ScopeAcls};

/// A container whose matrix is combined with its ancestors' ACLs.
pub trait InheritingContainer: AuthorizationContainer {
    fn inheritance_strategy(&self) -> InheritanceStrategy;

    /// Replace the strategy. Takes effect for the next check.
    fn set_inheritance_strategy(&self, strategy: InheritanceStrategy);
}

fn check_applicable(permission: &Permission, scope: PermissionScope) -> MatrixAuthResult<()> {
    if permission.is_contained_by(scope) {
        Ok(())
    } else {
        Err(MatrixAuthError::InapplicablePermission {
            permission: permission.id().to_string(),
            scope: scope.to_string(),
        })
    }
}

/// State shared by every scope kind.
#[derive(Debug)]
pub(crate) struct ScopeProperty {
    matrix: MatrixCell,
    strategy: RwLock<InheritanceStrategy>,
    scope: PermissionScope,
}

impl ScopeProperty {
    fn new(matrix: AuthorizationMatrix, strategy: InheritanceStrategy, scope: PermissionScope) -> Self {
        Self {
            matrix: MatrixCell::new(matrix),
            strategy: RwLock::new(strategy),
            scope,
        }
    }

    fn matrix(&self) -> Arc<AuthorizationMatrix> {
        self.matrix.load()
    }

    fn strategy(&self) -> InheritanceStrategy {
        *self.strategy.read()
    }

    fn set_strategy(&self, strategy: InheritanceStrategy) {
        let previous = std::mem::replace(&mut *self.strategy.write(), strategy);
        if previous != strategy {
            info!(scope = %self.scope, from = %previous, to = %strategy, "inheritance strategy replaced");
        }
    }

    fn grant(&self, permission: &Permission, entry: PermissionEntry) -> MatrixAuthResult<()> {
        check_applicable(permission, self.scope)?;
        self.matrix.grant(permission, entry);
        Ok(())
    }
}

macro_rules! scope_property {
    ($(#[$doc:meta])* $name:ident, $scope:expr, $default:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name(ScopeProperty);

        impl $name {
            pub const DEFAULT_STRATEGY: InheritanceStrategy = $default;

            /// A property with the default strategy for this scope kind.
            pub fn new(matrix: AuthorizationMatrix) -> Self {
                Self::with_strategy(matrix, Self::DEFAULT_STRATEGY)
            }

            pub fn with_strategy(matrix: AuthorizationMatrix, strategy: InheritanceStrategy) -> Self {
                Self(ScopeProperty::new(matrix, strategy, $scope))
            }
        }

        impl AuthorizationContainer for $name {
            fn matrix(&self) -> Arc<AuthorizationMatrix> {
                self.0.matrix()
            }

            fn permission_scope(&self) -> PermissionScope {
                $scope
            }

            fn grant(&self, permission: &Permission, entry: PermissionEntry) -> MatrixAuthResult<()> {
                self.0.grant(permission, entry)
            }
        }

        impl InheritingContainer for $name {
            fn inheritance_strategy(&self) -> InheritanceStrategy {
                self.0.strategy()
            }

            fn set_inheritance_strategy(&self, strategy: InheritanceStrategy) {
                self.0.set_strategy(strategy)
            }
        }
    };
}

scope_property!(
    /// Authorization for a folder; grants apply to the folder and everything in it.
    FolderProperty,
    PermissionScope::ItemGroup,
    InheritanceStrategy::InheritParent
);

scope_property!(
    /// Authorization for a single job.
    JobProperty,
    PermissionScope::Item,
    InheritanceStrategy::InheritParent
);

scope_property!(
    /// Authorization for an agent.
    AgentProperty,
    PermissionScope::Computer,
    InheritanceStrategy::InheritGlobalOnly
);

/// The root matrix. It has no strategy: its decision is its own matrix.
#[derive(Debug)]
pub struct GlobalMatrix {
    matrix: MatrixCell,
}

impl GlobalMatrix {
    pub fn new(matrix: AuthorizationMatrix) -> Self {
        Self {
            matrix: MatrixCell::new(matrix),
        }
    }

    /// Replace the whole global matrix, e.g. after a configuration reload.
    pub fn replace(&self, matrix: AuthorizationMatrix) {
        self.matrix.replace(matrix);
    }
}

impl Acl for GlobalMatrix {
    fn decide(&self, sid: &str, permission: &Permission, principal: bool) -> Decision {
        self.matrix.load().decide(sid, permission, principal)
    }
}

impl AuthorizationContainer for GlobalMatrix {
    fn matrix(&self) -> Arc<AuthorizationMatrix> {
        self.matrix.load()
    }

    fn permission_scope(&self) -> PermissionScope {
        PermissionScope::Global
    }

    fn grant(&self, permission: &Permission, entry: PermissionEntry) -> MatrixAuthResult<()> {
        check_applicable(permission, PermissionScope::Global)?;
        self.matrix.grant(permission, entry);
        Ok(())
    }
}

/// The effective ACL of one scope.
///
/// Reads the container's current matrix and strategy on every check, so a
/// replaced strategy or a post-load grant is visible immediately.
pub struct EffectiveAcl {
    container: Arc<dyn InheritingContainer>,
    parent: Option<Arc<dyn Acl>>,
    root: Arc<dyn Acl>,
    options: Arc<InheritanceOptions>,
}

impl EffectiveAcl {
    pub fn new(
        container: Arc<dyn InheritingContainer>,
        parent: Option<Arc<dyn Acl>>,
        root: Arc<dyn Acl>,
        options: Arc<InheritanceOptions>,
    ) -> Self {
        Self {
            container,
            parent,
            root,
            options,
        }
    }
}

impl EffectiveAcl {
    fn acls<'a>(&'a self, matrix: &'a AuthorizationMatrix) -> ScopeAcls<'a> {
        ScopeAcls {
            child: matrix,
            parent: self.parent.as_deref(),
            root: self.root.as_ref(),
        }
    }
}

impl Acl for EffectiveAcl {
    fn decide(&self, sid: &str, permission: &Permission, principal: bool) -> Decision {
        let matrix = self.container.matrix();
        let strategy = self.container.inheritance_strategy();
        trace!(strategy = %strategy, sid, permission = %permission, "effective check");
        strategy.decide(sid, permission, principal, self.acls(&matrix), &self.options)
    }

    fn is_granted(&self, authentication: &Authentication, permission: &Permission) -> bool {
        let matrix = self.container.matrix();
        let strategy = self.container.inheritance_strategy();
        trace!(strategy = %strategy, user = authentication.name(), permission = %permission, "effective check");
        strategy.is_granted(authentication, permission, self.acls(&matrix), &self.options)
    }
}
