//! The per-scope grant table and its decision algorithm.
//!
//! A matrix is populated through `MatrixBuilder` while a scope's
//! configuration is loaded, then frozen into an `AuthorizationMatrix` that is
//! read concurrently without locks. Later grants (auto-grant on creation, the
//! permission adder) go through `MatrixCell`, which swaps in a rebuilt copy.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::{debug, trace};

use matrixauth_contracts::{
    decision::Decision,
    entry::{AuthorizationType, PermissionEntry, ANONYMOUS},
    permission::Permission,
    settings::EngineSettings,
};

use crate::{identity::IdentityPolicy, registry::PermissionRegistry, traits::Acl};

/// What every matrix needs to answer a check: the permission graph and the
/// identity equivalence policy of the security realm.
#[derive(Debug, Clone)]
pub struct MatrixContext {
    registry: Arc<PermissionRegistry>,
    identity: IdentityPolicy,
}

impl MatrixContext {
    pub fn new(registry: Arc<PermissionRegistry>, identity: IdentityPolicy) -> Self {
        Self { registry, identity }
    }

    /// The standard permission set and identity policy configured by `settings`.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            Arc::new(PermissionRegistry::standard_with(settings)),
            IdentityPolicy::from_settings(settings),
        )
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    pub fn identity(&self) -> &IdentityPolicy {
        &self.identity
    }

    pub fn builder(&self) -> MatrixBuilder {
        MatrixBuilder::new(self.clone())
    }
}

impl Default for MatrixContext {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

/// Mutable accumulator used only while a scope's configuration is loaded.
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    context: MatrixContext,
    grants: BTreeMap<Permission, BTreeSet<PermissionEntry>>,
}

impl MatrixBuilder {
    pub fn new(context: MatrixContext) -> Self {
        Self {
            context,
            grants: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> &MatrixContext {
        &self.context
    }

    /// Grant `permission` to `entry`. Adding an existing grant is a no-op.
    pub fn add(&mut self, permission: &Permission, entry: PermissionEntry) -> &mut Self {
        debug!(permission = %permission, entry = %entry, "grant permission");
        self.grants.entry(permission.clone()).or_default().insert(entry);
        self
    }

    /// Chaining form of [`add`](Self::add).
    pub fn with(mut self, permission: &Permission, entry: PermissionEntry) -> Self {
        self.add(permission, entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn build(self) -> AuthorizationMatrix {
        let mut sids = BTreeSet::new();
        let mut groups = BTreeSet::new();
        for entry in self.grants.values().flatten() {
            sids.insert(entry.sid().to_string());
            if entry.kind() != AuthorizationType::User {
                groups.insert(entry.sid().to_string());
            }
        }
        AuthorizationMatrix {
            context: self.context,
            grants: self.grants,
            sids,
            groups,
        }
    }
}

/// An immutable mapping from permission to the entries it is granted to.
#[derive(Debug, Clone)]
pub struct AuthorizationMatrix {
    context: MatrixContext,
    grants: BTreeMap<Permission, BTreeSet<PermissionEntry>>,
    // Derived from `grants` at build time.
    sids: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl AuthorizationMatrix {
    pub fn empty(context: MatrixContext) -> Self {
        MatrixBuilder::new(context).build()
    }

    /// A builder seeded with this matrix's grants.
    pub fn to_builder(&self) -> MatrixBuilder {
        MatrixBuilder {
            context: self.context.clone(),
            grants: self.grants.clone(),
        }
    }

    pub fn context(&self) -> &MatrixContext {
        &self.context
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.context.registry
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// The raw grant table, ordered by permission id then entry.
    pub fn granted_entries(&self) -> &BTreeMap<Permission, BTreeSet<PermissionEntry>> {
        &self.grants
    }

    /// Entries granted exactly `permission`.
    pub fn grants(&self, permission: &Permission) -> impl Iterator<Item = &PermissionEntry> {
        self.grants.get(permission).into_iter().flatten()
    }

    /// Return true if `sid`, tested as a user (`principal`) or a group,
    /// holds `permission` directly or through a permission that implies it.
    pub fn has_permission(&self, sid: &str, permission: &Permission, principal: bool) -> bool {
        let registry = &self.context.registry;
        for candidate in registry.implying(permission).iter() {
            if !candidate.is_enabled() {
                continue;
            }
            if candidate.is_dangerous() && !registry.dangerous_permissions_enabled() {
                trace!(permission = %candidate, "dangerous permission checked as administer");
                return self.has_permission(sid, registry.administer(), principal);
            }
            if self.matches(candidate, sid, principal) {
                trace!(sid, permission = %permission, via = %candidate, principal, "granted");
                return true;
            }
        }
        false
    }

    /// Return true if `sid` holds exactly `permission`, ignoring implication.
    ///
    /// Entries of any type match when the sid is equal under the user or the
    /// group strategy. Dangerous permissions are still checked as Administer.
    pub fn has_explicit_permission(&self, sid: &str, permission: &Permission) -> bool {
        if !permission.is_enabled() {
            return false;
        }
        let registry = &self.context.registry;
        if permission.is_dangerous() && !registry.dangerous_permissions_enabled() {
            return self.has_explicit_permission(sid, registry.administer());
        }
        let identity = &self.context.identity;
        self.grants(permission)
            .any(|entry| identity.matches_any(entry.sid(), sid))
    }

    /// Return true if an entry of exactly `entry`'s type grants `permission`.
    ///
    /// Neither implication nor the dangerous-permission gate applies: this
    /// answers what the matrix literally contains, modulo sid equivalence.
    pub fn has_explicit_entry(&self, entry: &PermissionEntry, permission: &Permission) -> bool {
        if !permission.is_enabled() {
            return false;
        }
        let identity = &self.context.identity;
        self.grants(permission).any(|granted| {
            granted.kind() == entry.kind() && identity.matches_any(granted.sid(), entry.sid())
        })
    }

    /// Every sid with at least one grant, except `anonymous`, sorted by the
    /// identity comparator with equivalent sids collapsed.
    pub fn all_granted_sids(&self) -> Vec<String> {
        self.sorted(self.sids.iter().filter(|sid| sid.as_str() != ANONYMOUS))
    }

    /// Every sid recorded from a group or untyped entry, sorted like
    /// [`all_granted_sids`](Self::all_granted_sids).
    pub fn groups(&self) -> Vec<String> {
        self.sorted(self.groups.iter())
    }

    /// The raw sid index, including `anonymous`.
    pub fn sids(&self) -> &BTreeSet<String> {
        &self.sids
    }

    /// Union of all entries across all permissions.
    pub fn all_permission_entries(&self) -> BTreeSet<PermissionEntry> {
        self.grants.values().flatten().cloned().collect()
    }

    fn matches(&self, permission: &Permission, sid: &str, principal: bool) -> bool {
        let identity = &self.context.identity;
        self.grants(permission)
            .any(|entry| identity.matches(entry, sid, principal))
    }

    fn sorted<'a>(&self, sids: impl Iterator<Item = &'a String>) -> Vec<String> {
        let identity = &self.context.identity;
        let mut sorted: Vec<String> = sids.cloned().collect();
        sorted.sort_by(|a, b| identity.compare_sids(a, b));
        sorted.dedup_by(|a, b| identity.compare_sids(a, b) == Ordering::Equal);
        sorted
    }
}

impl Acl for AuthorizationMatrix {
    fn decide(&self, sid: &str, permission: &Permission, principal: bool) -> Decision {
        self.has_permission(sid, permission, principal).into()
    }
}

/// A shared slot holding the current matrix of one scope.
///
/// Readers take a cheap snapshot; a post-load grant rebuilds the matrix and
/// swaps it in, so a reader never observes a half-applied update.
#[derive(Debug)]
pub struct MatrixCell {
    current: RwLock<Arc<AuthorizationMatrix>>,
}

impl MatrixCell {
    pub fn new(matrix: AuthorizationMatrix) -> Self {
        Self {
            current: RwLock::new(Arc::new(matrix)),
        }
    }

    pub fn load(&self) -> Arc<AuthorizationMatrix> {
        Arc::clone(&self.current.read())
    }

    pub fn replace(&self, matrix: AuthorizationMatrix) {
        *self.current.write() = Arc::new(matrix);
    }

    /// Add one grant by copy-on-write.
    pub fn grant(&self, permission: &Permission, entry: PermissionEntry) {
        let mut current = self.current.write();
        let next = current.to_builder().with(permission, entry).build();
        *current = Arc::new(next);
    }
}
