//! Inheritance strategies: how a scope's own matrix combines with the ACLs
//! above it.
//!
//! | Strategy            | Decision                                           |
//! |---------------------|----------------------------------------------------|
//! | `InheritParent`     | child ∨ parent (root when there is no item parent) |
//! | `InheritGlobalOnly` | child ∨ root                                       |
//! | `NonInheriting`     | child, plus Administer-rooted permissions for root administrators |
//!
//! With `check_parent_permissions` on, item Read and Discover on a nested
//! item additionally require the parent item to grant them.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::trace;

use matrixauth_contracts::{
    authentication::Authentication,
    decision::Decision,
    error::{MatrixAuthError, MatrixAuthResult},
    permission::Permission,
    settings::EngineSettings,
};
use matrixauth_core::{registry::PermissionRegistry, standard, traits::Acl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InheritanceStrategy {
    #[serde(
        rename = "inheriting",
        alias = "InheritParent",
        alias = "org.jenkinsci.plugins.matrixauth.inheritance.InheritParentStrategy"
    )]
    InheritParent,
    #[serde(
        rename = "inheritingGlobal",
        alias = "InheritGlobalOnly",
        alias = "org.jenkinsci.plugins.matrixauth.inheritance.InheritGlobalStrategy"
    )]
    InheritGlobalOnly,
    #[serde(
        rename = "nonInheriting",
        alias = "NonInheriting",
        alias = "org.jenkinsci.plugins.matrixauth.inheritance.NonInheritingStrategy"
    )]
    NonInheriting,
}

impl InheritanceStrategy {
    pub const ALL: [InheritanceStrategy; 3] = [
        InheritanceStrategy::InheritParent,
        InheritanceStrategy::InheritGlobalOnly,
        InheritanceStrategy::NonInheriting,
    ];

    /// The persisted tag of this strategy.
    pub fn tag(self) -> &'static str {
        match self {
            InheritanceStrategy::InheritParent => "inheriting",
            InheritanceStrategy::InheritGlobalOnly => "inheritingGlobal",
            InheritanceStrategy::NonInheriting => "nonInheriting",
        }
    }

    /// Combine the child matrix with the ACLs above it for one sid.
    ///
    /// Only the ungated combinations distribute over a caller's identities;
    /// use [`InheritanceStrategy::is_granted`] to check a whole caller.
    pub fn decide(
        self,
        sid: &str,
        permission: &Permission,
        principal: bool,
        acls: ScopeAcls<'_>,
        options: &InheritanceOptions,
    ) -> Decision {
        let decision = Decision::from(
            self.combine(permission, acls, options, |acl, p| acl.has_permission(sid, p, principal)),
        );
        trace!(strategy = self.tag(), sid, permission = %permission, principal, ?decision, "inheritance decision");
        decision
    }

    /// Combine the child matrix with the ACLs above it for a whole caller.
    ///
    /// Each side is resolved over the user and all of its groups before
    /// the sides are combined, so a parent grant held through a group and a
    /// child grant held as a user together satisfy the parent check.
    pub fn is_granted(
        self,
        authentication: &Authentication,
        permission: &Permission,
        acls: ScopeAcls<'_>,
        options: &InheritanceOptions,
    ) -> bool {
        let granted = self.combine(permission, acls, options, |acl, p| acl.is_granted(authentication, p));
        trace!(strategy = self.tag(), user = authentication.name(), permission = %permission, granted, "inheritance decision");
        granted
    }

    fn combine(
        self,
        permission: &Permission,
        acls: ScopeAcls<'_>,
        options: &InheritanceOptions,
        holds: impl Fn(&dyn Acl, &Permission) -> bool,
    ) -> bool {
        let ScopeAcls { child, parent, root } = acls;
        let parent_gate = parent.filter(|_| options.requires_parent_grant(permission));

        match self {
            InheritanceStrategy::InheritParent => match (parent_gate, parent) {
                (Some(parent), _) => holds(parent, permission),
                (None, Some(parent)) => holds(parent, permission) || holds(child, permission),
                (None, None) => holds(root, permission) || holds(child, permission),
            },
            InheritanceStrategy::InheritGlobalOnly => {
                let inherited = holds(child, permission) || holds(root, permission);
                match parent_gate {
                    Some(parent) => inherited && holds(parent, permission),
                    None => inherited,
                }
            }
            InheritanceStrategy::NonInheriting => {
                if options.registry.is_ultimately_implied_by_administer(permission)
                    && holds(root, options.registry.administer())
                {
                    return true;
                }
                match parent_gate {
                    Some(parent) => holds(parent, permission) && holds(child, permission),
                    None => holds(child, permission),
                }
            }
        }
    }
}

impl fmt::Display for InheritanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for InheritanceStrategy {
    type Err = MatrixAuthError;

    fn from_str(s: &str) -> MatrixAuthResult<Self> {
        match s {
            "inheriting" | "InheritParent" => Ok(InheritanceStrategy::InheritParent),
            "inheritingGlobal" | "InheritGlobalOnly" => Ok(InheritanceStrategy::InheritGlobalOnly),
            "nonInheriting" | "NonInheriting" => Ok(InheritanceStrategy::NonInheriting),
            other => Err(MatrixAuthError::ConfigError {
                reason: format!("unknown inheritance strategy '{}'", other),
            }),
        }
    }
}

/// The three ACLs a strategy combines.
#[derive(Clone, Copy)]
pub struct ScopeAcls<'a> {
    /// The scope's own matrix.
    pub child: &'a dyn Acl,
    /// The effective ACL of the enclosing item, if the scope has one.
    pub parent: Option<&'a dyn Acl>,
    /// The global ACL.
    pub root: &'a dyn Acl,
}

/// Registry-derived inputs shared by every strategy evaluation.
#[derive(Debug, Clone)]
pub struct InheritanceOptions {
    registry: Arc<PermissionRegistry>,
    parent_checked: Vec<Permission>,
    check_parent_permissions: bool,
}

impl InheritanceOptions {
    pub fn new(registry: &Arc<PermissionRegistry>, settings: &EngineSettings) -> Self {
        let parent_checked = [standard::ITEM_READ, standard::ITEM_DISCOVER]
            .into_iter()
            .filter_map(|id| registry.get(id).cloned())
            .collect();
        Self {
            registry: Arc::clone(registry),
            parent_checked,
            check_parent_permissions: settings.check_parent_permissions,
        }
    }

    fn requires_parent_grant(&self, permission: &Permission) -> bool {
        self.check_parent_permissions && self.parent_checked.contains(permission)
    }
}
