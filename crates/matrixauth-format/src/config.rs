//! Whole-configuration TOML file.
//!
//! ```toml
//! [settings]
//! check_parent_permissions = true
//!
//! [global]
//! permissions = ["GROUP:hudson.model.Hudson.Administer:admins"]
//!
//! [[folders]]
//! name = "team"
//! inheritanceStrategy = "nonInheriting"
//! permissions = ["GROUP:hudson.model.Item.Read:team"]
//!
//! [[jobs]]
//! name = "team/build"
//!
//! [[agents]]
//! name = "linux-1"
//! entries = [{ user = { name = "ops", permissions = ["Agent/Configure"] } }]
//! ```
//!
//! A scope section with nothing but a name registers the scope without a
//! property, so it resolves to its parent's ACL.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use matrixauth_contracts::{
    error::{MatrixAuthError, MatrixAuthResult},
    permission::PermissionScope,
    settings::EngineSettings,
};
use matrixauth_core::{matrix::MatrixContext, traits::AuthorizationContainer};
use matrixauth_inheritance::{
    project::{ItemNode, ProjectMatrixStrategy},
    property::{AgentProperty, FolderProperty, InheritingContainer, JobProperty},
    scope::ScopeRef,
};

use crate::{document::PropertyDocument, report::LoadReport};

/// A named item or agent section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSection {
    pub name: String,
    #[serde(flatten)]
    pub property: PropertyDocument,
}

/// How grants are written on export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportStyle {
    /// String-form `permissions`.
    #[default]
    Permissions,
    /// Grouped `entries`.
    Entries,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub settings: EngineSettings,
    pub global: PropertyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<ScopeSection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<ScopeSection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<ScopeSection>,
}

impl MatrixConfig {
    /// Parse `s` as a TOML configuration.
    ///
    /// Returns `MatrixAuthError::ConfigError` if the TOML is malformed or
    /// does not match the `MatrixConfig` schema. Unknown permissions inside
    /// a well-formed document are not errors here; `build` reports them.
    pub fn from_toml_str(s: &str) -> MatrixAuthResult<Self> {
        toml::from_str(s).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to parse matrix configuration TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> MatrixAuthResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> MatrixAuthResult<String> {
        toml::to_string(self).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to serialize matrix configuration TOML: {}", e),
        })
    }

    /// Build the scope tree.
    ///
    /// Skipped grant records are collected in the report. Structural errors
    /// (an item whose parent folder is missing, an invalid name) fail the
    /// build.
    pub fn build(&self) -> MatrixAuthResult<(ProjectMatrixStrategy, LoadReport)> {
        let context = MatrixContext::from_settings(&self.settings);
        let mut report = LoadReport::default();

        if self.global.inheritance_strategy.is_some() || self.global.blocks_inheritance.is_some() {
            warn!("ignoring inheritance settings on the global matrix");
        }
        let (global, loaded) = self.global.build_matrix(
            &context,
            PermissionScope::Global,
            &ScopeRef::Global.to_string(),
        );
        report.merge(loaded);
        let strategy = ProjectMatrixStrategy::new(global, &self.settings);

        let mut items: Vec<(&ScopeSection, bool)> = self
            .folders
            .iter()
            .map(|s| (s, true))
            .chain(self.jobs.iter().map(|s| (s, false)))
            .collect();
        // Parents before children.
        items.sort_by_key(|(section, _)| section.name.matches('/').count());

        for (section, is_folder) in items {
            let label = ScopeRef::item(section.name.as_str()).to_string();
            let document = &section.property;
            if is_folder {
                let property = (!document.is_empty()).then(|| {
                    let (matrix, loaded) = document.build_matrix(&context, PermissionScope::ItemGroup, &label);
                    report.merge(loaded);
                    FolderProperty::with_strategy(matrix, document.strategy_or(FolderProperty::DEFAULT_STRATEGY))
                });
                strategy.add_folder(&section.name, property)?;
            } else {
                let property = (!document.is_empty()).then(|| {
                    let (matrix, loaded) = document.build_matrix(&context, PermissionScope::Item, &label);
                    report.merge(loaded);
                    JobProperty::with_strategy(matrix, document.strategy_or(JobProperty::DEFAULT_STRATEGY))
                });
                strategy.add_job(&section.name, property)?;
            }
        }

        for section in &self.agents {
            let label = ScopeRef::agent(section.name.as_str()).to_string();
            let document = &section.property;
            let property = (!document.is_empty()).then(|| {
                let (matrix, loaded) = document.build_matrix(&context, PermissionScope::Computer, &label);
                report.merge(loaded);
                AgentProperty::with_strategy(matrix, document.strategy_or(AgentProperty::DEFAULT_STRATEGY))
            });
            strategy.add_agent(&section.name, property)?;
        }

        info!(
            folders = self.folders.len(),
            jobs = self.jobs.len(),
            agents = self.agents.len(),
            loaded = report.loaded,
            skipped = report.skipped(),
            "matrix configuration loaded"
        );
        Ok((strategy, report))
    }

    /// The configuration that rebuilds `strategy`'s current state.
    pub fn export(strategy: &ProjectMatrixStrategy, settings: &EngineSettings, style: ExportStyle) -> Self {
        let document = |container: Option<&dyn InheritingContainer>| match container {
            None => PropertyDocument::default(),
            Some(container) => {
                let matrix = container.matrix();
                let strategy = Some(container.inheritance_strategy());
                match style {
                    ExportStyle::Permissions => PropertyDocument::from_matrix(&matrix, strategy),
                    ExportStyle::Entries => PropertyDocument::from_matrix_entries(&matrix, strategy),
                }
            }
        };

        let global_matrix = strategy.global().matrix();
        let global = match style {
            ExportStyle::Permissions => PropertyDocument::from_matrix(&global_matrix, None),
            ExportStyle::Entries => PropertyDocument::from_matrix_entries(&global_matrix, None),
        };

        let mut folders = Vec::new();
        let mut jobs = Vec::new();
        for (name, node) in strategy.items() {
            let container = node.container();
            let section = ScopeSection {
                name,
                property: document(container.as_deref()),
            };
            match node {
                ItemNode::Folder(_) => folders.push(section),
                ItemNode::Job(_) => jobs.push(section),
            }
        }
        let agents = strategy
            .agents()
            .into_iter()
            .map(|(name, property)| ScopeSection {
                name,
                property: document(property.as_deref().map(|p| p as &dyn InheritingContainer)),
            })
            .collect();

        Self {
            settings: settings.clone(),
            global,
            folders,
            jobs,
            agents,
        }
    }
}
