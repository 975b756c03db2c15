//! The persisted form of one scope's authorization: its grants and, for
//! items and agents, its inheritance strategy.
//!
//! ```json
//! {
//!   "inheritanceStrategy": "nonInheriting",
//!   "permissions": ["USER:hudson.model.Item.Build:alice"]
//! }
//! ```
//!
//! The legacy `blocksInheritance = true` selects `nonInheriting` unless an
//! explicit strategy is also present. The snake_case spellings
//! (`inheritance_strategy`, `blocks_inheritance`) are accepted on input.

use serde::{Deserialize, Serialize};
use tracing::warn;

use matrixauth_contracts::{
    error::{MatrixAuthError, MatrixAuthResult},
    permission::PermissionScope,
};
use matrixauth_core::matrix::{AuthorizationMatrix, MatrixContext};
use matrixauth_inheritance::strategy::InheritanceStrategy;

use crate::{
    casc::{self, DefinitionEntry},
    report::LoadReport,
    wire,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyDocument {
    #[serde(
        rename = "inheritanceStrategy",
        alias = "inheritance_strategy",
        skip_serializing_if = "Option::is_none"
    )]
    pub inheritance_strategy: Option<InheritanceStrategy>,

    #[serde(
        rename = "blocksInheritance",
        alias = "blocks_inheritance",
        skip_serializing_if = "Option::is_none"
    )]
    pub blocks_inheritance: Option<bool>,

    /// Grants in string form.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,

    /// Grants grouped by grantee.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<DefinitionEntry>,

    /// Deprecated spelling of `permissions`.
    #[serde(
        rename = "grantedPermissions",
        alias = "granted_permissions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub granted_permissions: Vec<String>,
}

impl PropertyDocument {
    /// A document holding every grant of `matrix` in string form.
    pub fn from_matrix(matrix: &AuthorizationMatrix, strategy: Option<InheritanceStrategy>) -> Self {
        Self {
            inheritance_strategy: strategy,
            permissions: wire::serialize_matrix(matrix),
            ..Self::default()
        }
    }

    /// Like [`from_matrix`](Self::from_matrix), with grants grouped by grantee.
    pub fn from_matrix_entries(matrix: &AuthorizationMatrix, strategy: Option<InheritanceStrategy>) -> Self {
        Self {
            inheritance_strategy: strategy,
            entries: casc::entries_from_matrix(matrix),
            ..Self::default()
        }
    }

    /// True if the document configures nothing at all.
    pub fn is_empty(&self) -> bool {
        self.inheritance_strategy.is_none()
            && self.blocks_inheritance.is_none()
            && self.permissions.is_empty()
            && self.entries.is_empty()
            && self.granted_permissions.is_empty()
    }

    /// The configured strategy, or `default` if none is configured.
    pub fn strategy_or(&self, default: InheritanceStrategy) -> InheritanceStrategy {
        match (self.inheritance_strategy, self.blocks_inheritance) {
            (Some(strategy), _) => strategy,
            (None, Some(true)) => InheritanceStrategy::NonInheriting,
            (None, _) => default,
        }
    }

    /// Build the scope's matrix. Skipped records are reported, not fatal.
    pub fn build_matrix(
        &self,
        context: &MatrixContext,
        scope: PermissionScope,
        label: &str,
    ) -> (AuthorizationMatrix, LoadReport) {
        let mut builder = context.builder();
        let mut report = wire::load_grants(
            &mut builder,
            scope,
            label,
            self.permissions.iter().map(String::as_str),
        );
        if !self.granted_permissions.is_empty() {
            warn!(
                scope = label,
                "loading deprecated attribute 'grantedPermissions'; use 'permissions' or 'entries' instead"
            );
            report.merge(wire::load_grants(
                &mut builder,
                scope,
                label,
                self.granted_permissions.iter().map(String::as_str),
            ));
        }
        report.merge(casc::load_entries(&mut builder, scope, label, &self.entries));
        (builder.build(), report)
    }

    pub fn from_json(s: &str) -> MatrixAuthResult<Self> {
        serde_json::from_str(s).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to parse property JSON: {}", e),
        })
    }

    pub fn to_json(&self) -> MatrixAuthResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to serialize property JSON: {}", e),
        })
    }

    pub fn from_toml_str(s: &str) -> MatrixAuthResult<Self> {
        toml::from_str(s).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to parse property TOML: {}", e),
        })
    }

    pub fn to_toml_string(&self) -> MatrixAuthResult<String> {
        toml::to_string(self).map_err(|e| MatrixAuthError::ConfigError {
            reason: format!("failed to serialize property TOML: {}", e),
        })
    }
}
