//! Tracking of legacy untyped (`EITHER`) grants.
//!
//! An untyped grant matches a user and a group of the same name, which is
//! rarely what an operator meant. The monitor keeps one flag per job, folder
//! and agent, updated on create/save, rename and delete; the global matrix is
//! read live. It is advisory only and never affects a decision.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use matrixauth_contracts::settings::EngineSettings;
use matrixauth_core::{matrix::AuthorizationMatrix, traits::AuthorizationContainer};
use matrixauth_inheritance::{
    project::{ItemNode, ProjectMatrixStrategy},
    property::GlobalMatrix,
};

/// True iff any grant in `matrix` is untyped.
pub fn has_ambiguous_entries(matrix: &AuthorizationMatrix) -> bool {
    matrix.all_permission_entries().iter().any(|e| e.is_ambiguous())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeCategory {
    Global,
    Job,
    Folder,
    Agent,
}

/// The last observed state of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbiguityRecord {
    pub ambiguous: bool,
    pub recorded_at: DateTime<Utc>,
}

pub struct AmbiguityMonitor {
    enabled: AtomicBool,
    global: Arc<GlobalMatrix>,
    jobs: DashMap<String, AmbiguityRecord>,
    folders: DashMap<String, AmbiguityRecord>,
    agents: DashMap<String, AmbiguityRecord>,
}

impl AmbiguityMonitor {
    pub fn new(global: Arc<GlobalMatrix>, enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            global,
            jobs: DashMap::new(),
            folders: DashMap::new(),
            agents: DashMap::new(),
        }
    }

    /// A monitor over `strategy`, with every scope recorded.
    pub fn from_strategy(strategy: &ProjectMatrixStrategy, settings: &EngineSettings) -> Self {
        let monitor = Self::new(Arc::clone(strategy.global()), settings.ambiguity_monitor);
        monitor.record_all(strategy);
        monitor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turning the monitor off drops everything recorded so far.
    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::Relaxed) == enabled {
            return;
        }
        if !enabled {
            self.jobs.clear();
            self.folders.clear();
            self.agents.clear();
        }
        info!(enabled, "ambiguity monitor toggled");
    }

    fn map(&self, category: ScopeCategory) -> Option<&DashMap<String, AmbiguityRecord>> {
        match category {
            ScopeCategory::Global => None,
            ScopeCategory::Job => Some(&self.jobs),
            ScopeCategory::Folder => Some(&self.folders),
            ScopeCategory::Agent => Some(&self.agents),
        }
    }

    /// Record a created or saved scope. `None` means the scope has no
    /// matrix of its own.
    pub fn record(&self, category: ScopeCategory, name: &str, matrix: Option<&AuthorizationMatrix>) {
        if !self.is_enabled() {
            return;
        }
        let Some(map) = self.map(category) else {
            return;
        };
        let ambiguous = matrix.is_some_and(has_ambiguous_entries);
        debug!(?category, scope = name, ambiguous, "ambiguity recorded");
        map.insert(
            name.to_string(),
            AmbiguityRecord {
                ambiguous,
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn renamed(&self, category: ScopeCategory, old: &str, new: &str) {
        if let Some(map) = self.map(category) {
            if let Some((_, record)) = map.remove(old) {
                map.insert(new.to_string(), record);
            }
        }
    }

    pub fn removed(&self, category: ScopeCategory, name: &str) {
        if let Some(map) = self.map(category) {
            map.remove(name);
        }
    }

    /// Apply the `(old, new)` pairs returned by an item rename.
    pub fn items_moved(&self, moves: &[(String, String)]) {
        for (old, new) in moves {
            self.renamed(ScopeCategory::Job, old, new);
            self.renamed(ScopeCategory::Folder, old, new);
        }
    }

    /// Forget the full names returned by an item removal.
    pub fn items_removed(&self, names: &[String]) {
        for name in names {
            self.removed(ScopeCategory::Job, name);
            self.removed(ScopeCategory::Folder, name);
        }
    }

    /// Re-record every item and agent of `strategy`.
    pub fn record_all(&self, strategy: &ProjectMatrixStrategy) {
        if !self.is_enabled() {
            return;
        }
        for (name, node) in strategy.items() {
            let matrix = node.container().map(|c| c.matrix());
            let category = match node {
                ItemNode::Folder(_) => ScopeCategory::Folder,
                ItemNode::Job(_) => ScopeCategory::Job,
            };
            self.record(category, &name, matrix.as_deref());
        }
        for (name, property) in strategy.agents() {
            let matrix = property.map(|p| p.matrix());
            self.record(ScopeCategory::Agent, &name, matrix.as_deref());
        }
    }

    pub fn global_ambiguous(&self) -> bool {
        self.is_enabled() && has_ambiguous_entries(&self.global.matrix())
    }

    /// True if any tracked scope currently carries an untyped grant.
    pub fn is_activated(&self) -> bool {
        self.global_ambiguous()
            || [&self.jobs, &self.folders, &self.agents]
                .into_iter()
                .any(|map| map.iter().any(|r| r.ambiguous))
    }

    pub fn ambiguous_jobs(&self) -> Vec<String> {
        Self::ambiguous_names(&self.jobs)
    }

    pub fn ambiguous_folders(&self) -> Vec<String> {
        Self::ambiguous_names(&self.folders)
    }

    pub fn ambiguous_agents(&self) -> Vec<String> {
        Self::ambiguous_names(&self.agents)
    }

    pub fn get(&self, category: ScopeCategory, name: &str) -> Option<AmbiguityRecord> {
        self.map(category)?.get(name).map(|r| *r)
    }

    fn ambiguous_names(map: &DashMap<String, AmbiguityRecord>) -> Vec<String> {
        let mut names: Vec<String> = map
            .iter()
            .filter(|r| r.ambiguous)
            .map(|r| r.key().clone())
            .collect();
        names.sort_by_cached_key(|name| name.to_lowercase());
        names
    }
}
