//! The permission graph and its implication cache.
//!
//! `PermissionRegistry` is built once at startup through
//! `PermissionRegistryBuilder`, then shared behind an `Arc` by every matrix.
//! It never changes afterwards, so concurrent readers need no locking beyond
//! the cache's own sharded map.
//!
//! Invariants enforced at registration:
//!
//! - identifiers (and short forms) are unique
//! - an implying parent must already be registered, so the graph is a forest
//! - the Administer permission is a root and is not dangerous

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use tracing::debug;

use matrixauth_contracts::{
    error::{MatrixAuthError, MatrixAuthResult},
    permission::{Permission, PermissionScope, PermissionSpec},
    settings::EngineSettings,
};

use crate::standard;

/// Builder for a `PermissionRegistry`.
#[derive(Debug)]
pub struct PermissionRegistryBuilder {
    permissions: Vec<Permission>,
    by_id: HashMap<String, Permission>,
    by_short_form: HashMap<String, Permission>,
    administer: Permission,
    dangerous_enabled: bool,
}

impl PermissionRegistryBuilder {
    /// Start a registry rooted at the standard Overall/Administer permission.
    pub fn new() -> Self {
        let administer = Permission::from_spec(standard::administer_spec());
        let mut builder = Self {
            permissions: Vec::new(),
            by_id: HashMap::new(),
            by_short_form: HashMap::new(),
            administer: administer.clone(),
            dangerous_enabled: false,
        };
        builder.insert(administer);
        builder
    }

    /// Start a registry rooted at a custom Administer permission.
    pub fn with_administer(spec: PermissionSpec) -> MatrixAuthResult<Self> {
        if spec.implied_by.is_some() {
            return Err(MatrixAuthError::InvalidDefinition {
                reason: format!("administer permission '{}' must not be implied by another permission", spec.id()),
            });
        }
        if spec.dangerous {
            return Err(MatrixAuthError::InvalidDefinition {
                reason: format!("administer permission '{}' must not be dangerous", spec.id()),
            });
        }
        let administer = Permission::from_spec(spec);
        let mut builder = Self {
            permissions: Vec::new(),
            by_id: HashMap::new(),
            by_short_form: HashMap::new(),
            administer: administer.clone(),
            dangerous_enabled: false,
        };
        builder.insert(administer);
        Ok(builder)
    }

    pub fn administer(&self) -> &Permission {
        &self.administer
    }

    /// Register a permission and return its handle.
    pub fn register(&mut self, spec: PermissionSpec) -> MatrixAuthResult<Permission> {
        let id = spec.id();
        if self.by_id.contains_key(&id) {
            return Err(MatrixAuthError::DuplicatePermission { id });
        }
        let short_form = format!("{}/{}", spec.title, spec.name);
        if self.by_short_form.contains_key(&short_form) {
            return Err(MatrixAuthError::DuplicatePermission { id: short_form });
        }
        if let Some(parent) = &spec.implied_by {
            let registered = self
                .by_id
                .get(parent.id())
                .ok_or_else(|| MatrixAuthError::UnknownParent {
                    id: id.clone(),
                    parent: parent.id().to_string(),
                })?;
            // Same id but a different definition would let a foreign chain in.
            if registered.implied_by() != parent.implied_by() {
                return Err(MatrixAuthError::UnknownParent {
                    id,
                    parent: parent.id().to_string(),
                });
            }
        }
        let permission = Permission::from_spec(spec);
        self.insert(permission.clone());
        Ok(permission)
    }

    /// Turn the dangerous-permission gate off for the whole process.
    pub fn enable_dangerous_permissions(mut self, enabled: bool) -> Self {
        self.dangerous_enabled = enabled;
        self
    }

    pub fn build(self) -> PermissionRegistry {
        let implying = DashMap::with_capacity(self.permissions.len());
        for permission in &self.permissions {
            implying.insert(permission.id().to_string(), compute_implying(permission));
        }
        debug!(
            permissions = self.permissions.len(),
            dangerous_enabled = self.dangerous_enabled,
            "permission registry built"
        );
        PermissionRegistry {
            permissions: self.permissions,
            by_id: self.by_id,
            by_short_form: self.by_short_form,
            administer: self.administer,
            dangerous_enabled: self.dangerous_enabled,
            implying,
        }
    }

    fn insert(&mut self, permission: Permission) {
        self.by_id.insert(permission.id().to_string(), permission.clone());
        self.by_short_form.insert(permission.short_form(), permission.clone());
        self.permissions.push(permission);
    }
}

impl Default for PermissionRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The immutable, process-wide permission graph.
#[derive(Debug)]
pub struct PermissionRegistry {
    permissions: Vec<Permission>,
    by_id: HashMap<String, Permission>,
    by_short_form: HashMap<String, Permission>,
    administer: Permission,
    dangerous_enabled: bool,
    implying: DashMap<String, Arc<[Permission]>>,
}

impl PermissionRegistry {
    pub fn builder() -> PermissionRegistryBuilder {
        PermissionRegistryBuilder::new()
    }

    /// The standard permission set with the dangerous gate closed.
    pub fn standard() -> Self {
        Self::standard_with(&EngineSettings::default())
    }

    /// The standard permission set, honouring the dangerous-permission setting.
    pub fn standard_with(settings: &EngineSettings) -> Self {
        standard::builder()
            .enable_dangerous_permissions(settings.enable_dangerous_permissions)
            .build()
    }

    pub fn administer(&self) -> &Permission {
        &self.administer
    }

    pub fn dangerous_permissions_enabled(&self) -> bool {
        self.dangerous_enabled
    }

    /// Look up a permission by its internal identifier.
    pub fn get(&self, id: &str) -> Option<&Permission> {
        self.by_id.get(id)
    }

    /// Look up a permission by internal identifier or `Title/Name` short form.
    pub fn find(&self, id: &str) -> Option<&Permission> {
        self.by_id.get(id).or_else(|| self.by_short_form.get(id))
    }

    /// Like [`find`](Self::find), but a miss is an error.
    pub fn permission(&self, id: &str) -> MatrixAuthResult<Permission> {
        self.find(id)
            .cloned()
            .ok_or_else(|| MatrixAuthError::UnknownPermission { id: id.to_string() })
    }

    /// Every registered permission in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// Permissions to present to users: disabled ones are hidden.
    pub fn enabled(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter().filter(|p| p.is_enabled())
    }

    /// Enabled permissions applicable to the given container scope.
    pub fn applicable(&self, scope: PermissionScope) -> impl Iterator<Item = &Permission> {
        self.enabled().filter(move |p| p.is_contained_by(scope))
    }

    /// The fixed set of permissions gated behind Administer.
    pub fn dangerous(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter().filter(|p| p.is_dangerous())
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// The implication chain of `permission`, itself first.
    ///
    /// Served from the cache; a miss (a permission created outside this
    /// registry) computes the chain once and stores it.
    pub fn implying(&self, permission: &Permission) -> Arc<[Permission]> {
        if let Some(cached) = self.implying.get(permission.id()) {
            return Arc::clone(cached.value());
        }
        let computed = compute_implying(permission);
        self.implying
            .entry(permission.id().to_string())
            .or_insert(computed)
            .value()
            .clone()
    }

    /// Return true iff `by` appears in the implication chain of `permission`.
    pub fn is_implied_by(&self, permission: &Permission, by: &Permission) -> bool {
        self.implying(permission).iter().any(|p| p == by)
    }

    /// Return true if walking `implied_by` from `permission` ends at Administer.
    pub fn is_ultimately_implied_by_administer(&self, permission: &Permission) -> bool {
        self.implying(permission)
            .last()
            .is_some_and(|root| root == &self.administer)
    }
}

fn compute_implying(permission: &Permission) -> Arc<[Permission]> {
    permission.chain().cloned().collect::<Vec<_>>().into()
}
