//! The scope tree: a global matrix plus per-folder, per-job, and per-agent
//! properties.
//!
//! Items are addressed by full name (`folder/sub/job`). An item's parent must
//! be registered before the item itself. Resolution of an item's ACL:
//!
//! - with a property: the property's strategy over (own matrix, the parent
//!   item's ACL if nested, the root ACL)
//! - without a property: the parent item's ACL, or the root ACL at top level

use std::{cmp::Ordering, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, info};

use matrixauth_contracts::{
    authentication::Authentication,
    entry::{AuthorizationType, PermissionEntry},
    error::{MatrixAuthError, MatrixAuthResult},
    permission::Permission,
    settings::EngineSettings,
};
use matrixauth_core::{
    matrix::{AuthorizationMatrix, MatrixContext},
    standard,
    traits::{Acl, AuthorizationContainer},
};

use crate::{
    property::{AgentProperty, EffectiveAcl, FolderProperty, GlobalMatrix, InheritingContainer, JobProperty},
    scope::{parent_name, ScopeRef},
    strategy::InheritanceOptions,
};

/// A registered item and its optional authorization property.
#[derive(Debug, Clone)]
pub enum ItemNode {
    Folder(Option<Arc<FolderProperty>>),
    Job(Option<Arc<JobProperty>>),
}

impl ItemNode {
    pub fn is_folder(&self) -> bool {
        matches!(self, ItemNode::Folder(_))
    }

    pub fn container(&self) -> Option<Arc<dyn InheritingContainer>> {
        match self {
            ItemNode::Folder(property) => property.clone().map(|p| p as Arc<dyn InheritingContainer>),
            ItemNode::Job(property) => property.clone().map(|p| p as Arc<dyn InheritingContainer>),
        }
    }
}

fn unknown(kind: &str, name: &str) -> MatrixAuthError {
    MatrixAuthError::UnknownScope {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

pub struct ProjectMatrixStrategy {
    context: MatrixContext,
    options: Arc<InheritanceOptions>,
    global: Arc<GlobalMatrix>,
    items: DashMap<String, ItemNode>,
    agents: DashMap<String, Option<Arc<AgentProperty>>>,
}

impl ProjectMatrixStrategy {
    pub fn new(global: AuthorizationMatrix, settings: &EngineSettings) -> Self {
        let context = global.context().clone();
        let options = Arc::new(InheritanceOptions::new(context.registry(), settings));
        Self {
            context,
            options,
            global: Arc::new(GlobalMatrix::new(global)),
            items: DashMap::new(),
            agents: DashMap::new(),
        }
    }

    pub fn context(&self) -> &MatrixContext {
        &self.context
    }

    pub fn options(&self) -> &Arc<InheritanceOptions> {
        &self.options
    }

    pub fn global(&self) -> &Arc<GlobalMatrix> {
        &self.global
    }

    pub fn root_acl(&self) -> Arc<dyn Acl> {
        self.global.clone()
    }

    // ── Tree maintenance ─────────────────────────────────────────────────────

    pub fn add_folder(&self, full_name: &str, property: Option<FolderProperty>) -> MatrixAuthResult<()> {
        self.insert_item(full_name, ItemNode::Folder(property.map(Arc::new)))
    }

    pub fn add_job(&self, full_name: &str, property: Option<JobProperty>) -> MatrixAuthResult<()> {
        self.insert_item(full_name, ItemNode::Job(property.map(Arc::new)))
    }

    pub fn add_agent(&self, name: &str, property: Option<AgentProperty>) -> MatrixAuthResult<()> {
        if name.is_empty() || name.contains('/') {
            return Err(MatrixAuthError::ConfigError {
                reason: format!("invalid agent name '{}'", name),
            });
        }
        self.agents.insert(name.to_string(), property.map(Arc::new));
        debug!(agent = name, "agent registered");
        Ok(())
    }

    fn insert_item(&self, full_name: &str, node: ItemNode) -> MatrixAuthResult<()> {
        if full_name.is_empty() || full_name.split('/').any(str::is_empty) {
            return Err(MatrixAuthError::ConfigError {
                reason: format!("invalid item name '{}'", full_name),
            });
        }
        if let Some(parent) = parent_name(full_name) {
            let is_folder = self.items.get(parent).map(|n| n.is_folder());
            if is_folder != Some(true) {
                return Err(unknown("folder", parent));
            }
        }
        debug!(item = full_name, folder = node.is_folder(), "item registered");
        self.items.insert(full_name.to_string(), node);
        Ok(())
    }

    pub fn item(&self, full_name: &str) -> Option<ItemNode> {
        self.items.get(full_name).map(|n| n.value().clone())
    }

    /// Every item, sorted by full name.
    pub fn items(&self) -> Vec<(String, ItemNode)> {
        let mut items: Vec<_> = self
            .items
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }

    pub fn agent_property(&self, name: &str) -> MatrixAuthResult<Option<Arc<AgentProperty>>> {
        self.agents
            .get(name)
            .map(|p| p.value().clone())
            .ok_or_else(|| unknown("agent", name))
    }

    /// Every agent, sorted by name.
    pub fn agents(&self) -> Vec<(String, Option<Arc<AgentProperty>>)> {
        let mut agents: Vec<_> = self
            .agents
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        agents.sort_by(|a, b| a.0.cmp(&b.0));
        agents
    }

    fn subtree(&self, full_name: &str) -> Vec<String> {
        let prefix = format!("{}/", full_name);
        let mut names: Vec<String> = self
            .items
            .iter()
            .map(|e| e.key().clone())
            .filter(|name| name == full_name || name.starts_with(&prefix))
            .collect();
        names.sort();
        names
    }

    /// Remove an item and everything below it. Returns the removed full names.
    pub fn remove_item(&self, full_name: &str) -> Vec<String> {
        let removed = self.subtree(full_name);
        for name in &removed {
            self.items.remove(name);
        }
        if !removed.is_empty() {
            info!(item = full_name, removed = removed.len(), "item removed");
        }
        removed
    }

    /// Move an item (and everything below it) to a new full name.
    ///
    /// Returns the `(old, new)` pairs of every moved item.
    pub fn rename_item(&self, old: &str, new: &str) -> MatrixAuthResult<Vec<(String, String)>> {
        if self.items.get(old).is_none() {
            return Err(unknown("item", old));
        }
        if self.items.get(new).is_some() {
            return Err(MatrixAuthError::ConfigError {
                reason: format!("cannot rename '{}': '{}' already exists", old, new),
            });
        }
        if let Some(parent) = parent_name(new) {
            if parent == old || parent.starts_with(&format!("{}/", old)) {
                return Err(MatrixAuthError::ConfigError {
                    reason: format!("cannot move '{}' into itself", old),
                });
            }
            if self.items.get(parent).map(|n| n.is_folder()) != Some(true) {
                return Err(unknown("folder", parent));
            }
        }

        let moves: Vec<(String, String)> = self
            .subtree(old)
            .into_iter()
            .map(|name| {
                let renamed = format!("{}{}", new, &name[old.len()..]);
                (name, renamed)
            })
            .collect();
        for (from, to) in &moves {
            if let Some((_, node)) = self.items.remove(from) {
                self.items.insert(to.clone(), node);
            }
        }
        info!(from = old, to = new, moved = moves.len(), "item renamed");
        Ok(moves)
    }

    pub fn remove_agent(&self, name: &str) -> bool {
        self.agents.remove(name).is_some()
    }

    pub fn rename_agent(&self, old: &str, new: &str) -> MatrixAuthResult<()> {
        let (_, property) = self.agents.remove(old).ok_or_else(|| unknown("agent", old))?;
        self.agents.insert(new.to_string(), property);
        Ok(())
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// The effective ACL of an item.
    pub fn item_acl(&self, full_name: &str) -> MatrixAuthResult<Arc<dyn Acl>> {
        let node = self.item(full_name).ok_or_else(|| unknown("item", full_name))?;
        let parent = parent_name(full_name);
        match node.container() {
            Some(container) => {
                let parent_acl = parent.map(|p| self.item_acl(p)).transpose()?;
                Ok(Arc::new(EffectiveAcl::new(
                    container,
                    parent_acl,
                    self.root_acl(),
                    Arc::clone(&self.options),
                )))
            }
            None => match parent {
                Some(parent) => self.item_acl(parent),
                None => Ok(self.root_acl()),
            },
        }
    }

    /// The effective ACL of an agent.
    pub fn agent_acl(&self, name: &str) -> MatrixAuthResult<Arc<dyn Acl>> {
        match self.agent_property(name)? {
            Some(property) => Ok(Arc::new(EffectiveAcl::new(
                property,
                None,
                self.root_acl(),
                Arc::clone(&self.options),
            ))),
            None => Ok(self.root_acl()),
        }
    }

    pub fn acl(&self, scope: &ScopeRef) -> MatrixAuthResult<Arc<dyn Acl>> {
        match scope {
            ScopeRef::Global => Ok(self.root_acl()),
            ScopeRef::Item(name) => self.item_acl(name),
            ScopeRef::Agent(name) => self.agent_acl(name),
        }
    }

    /// Check `permission` for a resolved caller on `scope`.
    pub fn has_permission(
        &self,
        scope: &ScopeRef,
        authentication: &Authentication,
        permission: &Permission,
    ) -> MatrixAuthResult<bool> {
        Ok(self.acl(scope)?.is_granted(authentication, permission))
    }

    /// Every sid that may name a group, across all scopes.
    pub fn groups(&self) -> Vec<String> {
        let mut groups = self.global.matrix().groups();
        for (_, node) in self.items() {
            if let Some(container) = node.container() {
                groups.extend(container.matrix().groups());
            }
        }
        for property in self.agents().into_iter().filter_map(|(_, p)| p) {
            groups.extend(property.matrix().groups());
        }
        let identity = self.context.identity();
        groups.sort_by(|a, b| identity.compare_sids(a, b));
        groups.dedup_by(|a, b| identity.compare_sids(a, b) == Ordering::Equal);
        groups
    }

    // ── Post-load grants ─────────────────────────────────────────────────────

    /// The container for `scope`, creating an item or agent property with the
    /// default strategy if there is none yet.
    pub fn container(&self, scope: &ScopeRef) -> MatrixAuthResult<Arc<dyn AuthorizationContainer>> {
        let container: Arc<dyn AuthorizationContainer> = match scope {
            ScopeRef::Global => self.global.clone(),
            ScopeRef::Item(name) => {
                let mut node = self.items.get_mut(name).ok_or_else(|| unknown("item", name))?;
                match node.value_mut() {
                    ItemNode::Folder(slot) => slot
                        .get_or_insert_with(|| {
                            Arc::new(FolderProperty::new(AuthorizationMatrix::empty(self.context.clone())))
                        })
                        .clone() as Arc<dyn AuthorizationContainer>,
                    ItemNode::Job(slot) => slot
                        .get_or_insert_with(|| {
                            Arc::new(JobProperty::new(AuthorizationMatrix::empty(self.context.clone())))
                        })
                        .clone() as Arc<dyn AuthorizationContainer>,
                }
            }
            ScopeRef::Agent(name) => {
                let mut slot = self.agents.get_mut(name).ok_or_else(|| unknown("agent", name))?;
                slot.value_mut()
                    .get_or_insert_with(|| {
                        Arc::new(AgentProperty::new(AuthorizationMatrix::empty(self.context.clone())))
                    })
                    .clone()
            }
        };
        Ok(container)
    }

    pub fn grant(&self, scope: &ScopeRef, permission: &Permission, entry: PermissionEntry) -> MatrixAuthResult<()> {
        info!(scope = %scope, permission = %permission, entry = %entry, "granting permission");
        self.container(scope)?.grant(permission, entry)
    }

    /// Grant `permission` to `user` on the global matrix.
    pub fn add_permission_for_user(&self, user: &str, permission: &Permission) -> MatrixAuthResult<()> {
        let entry = PermissionEntry::try_new(AuthorizationType::User, user)?;
        self.grant(&ScopeRef::Global, permission, entry)
    }

    /// Give the creator of a new job or folder Read and Configure on it,
    /// unless the item's ACL already grants them.
    pub fn on_item_created(&self, full_name: &str, creator: &Authentication) -> MatrixAuthResult<()> {
        self.grant_creator(
            &ScopeRef::item(full_name),
            creator,
            &[standard::ITEM_READ, standard::ITEM_CONFIGURE],
        )
    }

    /// Give the creator of a new agent Configure on it, unless the agent's
    /// ACL already grants it.
    pub fn on_agent_created(&self, name: &str, creator: &Authentication) -> MatrixAuthResult<()> {
        self.grant_creator(&ScopeRef::agent(name), creator, &[standard::COMPUTER_CONFIGURE])
    }

    fn grant_creator(&self, scope: &ScopeRef, creator: &Authentication, ids: &[&str]) -> MatrixAuthResult<()> {
        let acl = self.acl(scope)?;
        let registry = self.context.registry();
        let mut missing = Vec::new();
        for id in ids {
            let permission = registry.permission(id)?;
            if !acl.is_granted(creator, &permission) {
                missing.push(permission);
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        let container = self.container(scope)?;
        for permission in &missing {
            let entry = PermissionEntry::try_new(AuthorizationType::User, creator.name())?;
            container.grant(permission, entry)?;
        }
        info!(scope = %scope, creator = creator.name(), granted = missing.len(), "granted creator permissions");
        Ok(())
    }
}
