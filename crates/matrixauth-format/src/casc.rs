//! Grants grouped by grantee, as written in configuration-as-code files.
//!
//! ```toml
//! entries = [
//!   { user = { name = "alice", permissions = ["Job/Build", "Job/Read"] } },
//!   { group = { name = "devs", permissions = ["Job/Read"] } },
//!   { userOrGroup = { name = "ops", permissions = ["Overall/Read"] } },
//! ]
//! ```

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::warn;

use matrixauth_contracts::{
    entry::{AuthorizationType, PermissionEntry},
    error::{MatrixAuthError, MatrixAuthResult},
    permission::{Permission, PermissionScope},
};
use matrixauth_core::matrix::{AuthorizationMatrix, MatrixBuilder};

use crate::report::LoadReport;

/// The grantee of one entry and the permissions granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionChild {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Exactly one of `user`, `group` or `userOrGroup` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<DefinitionChild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<DefinitionChild>,
    #[serde(
        rename = "userOrGroup",
        alias = "user_or_group",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_or_group: Option<DefinitionChild>,
}

fn key(kind: AuthorizationType) -> &'static str {
    match kind {
        AuthorizationType::User => "user",
        AuthorizationType::Group => "group",
        AuthorizationType::Either => "userOrGroup",
    }
}

impl DefinitionEntry {
    pub fn new(kind: AuthorizationType, child: DefinitionChild) -> Self {
        let mut entry = Self::default();
        match kind {
            AuthorizationType::User => entry.user = Some(child),
            AuthorizationType::Group => entry.group = Some(child),
            AuthorizationType::Either => entry.user_or_group = Some(child),
        }
        entry
    }

    /// The grantee and its child, or an error unless exactly one kind is set.
    pub fn resolve(&self) -> MatrixAuthResult<(PermissionEntry, &DefinitionChild)> {
        let set: Vec<(AuthorizationType, &DefinitionChild)> = [
            (AuthorizationType::User, self.user.as_ref()),
            (AuthorizationType::Group, self.group.as_ref()),
            (AuthorizationType::Either, self.user_or_group.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, child)| child.map(|c| (kind, c)))
        .collect();

        match set.as_slice() {
            [(kind, child)] => Ok((PermissionEntry::try_new(*kind, child.name.clone())?, child)),
            [] => Err(MatrixAuthError::ConfigError {
                reason: "entry must configure one of: 'user', 'group', 'userOrGroup'".to_string(),
            }),
            [(first_kind, first), (kind, child), ..] => Err(MatrixAuthError::ConfigError {
                reason: format!(
                    "can only configure one of: 'user', 'group', 'userOrGroup', but '{}' with name '{}' \
                     conflicts with '{}' set to '{}'",
                    key(*kind),
                    child.name,
                    key(*first_kind),
                    first.name
                ),
            }),
        }
    }

    fn label(&self) -> String {
        [&self.user, &self.group, &self.user_or_group]
            .into_iter()
            .flatten()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Add every grant described by `entries` to `builder`.
///
/// A conflicting entry is skipped as a whole; an unknown or inapplicable
/// permission skips only that permission.
pub fn load_entries(
    builder: &mut MatrixBuilder,
    scope: PermissionScope,
    label: &str,
    entries: &[DefinitionEntry],
) -> LoadReport {
    let registry = Arc::clone(builder.context().registry());
    let mut report = LoadReport::default();

    for definition in entries {
        let (entry, child) = match definition.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(scope = label, error = %e, "skipping entry");
                report.warn(label, definition.label(), e.to_string());
                continue;
            }
        };
        for name in &child.permissions {
            let record = format!("{}:{}", entry, name);
            let permission = match registry.permission(name) {
                Ok(p) if p.is_contained_by(scope) => p,
                Ok(p) => {
                    let e = MatrixAuthError::InapplicablePermission {
                        permission: p.id().to_string(),
                        scope: scope.to_string(),
                    };
                    warn!(scope = label, entry = %entry, error = %e, "skipping permission");
                    report.warn(label, record, e.to_string());
                    continue;
                }
                Err(e) => {
                    warn!(scope = label, entry = %entry, error = %e, "skipping permission");
                    report.warn(label, record, e.to_string());
                    continue;
                }
            };
            builder.add(&permission, entry.clone());
            report.loaded += 1;
        }
    }
    report
}

/// Group the grants of `matrix` by entry.
///
/// Entries are ordered by type and then sid; each entry's permissions are
/// listed by short form.
pub fn entries_from_matrix(matrix: &AuthorizationMatrix) -> Vec<DefinitionEntry> {
    let mut by_entry: BTreeMap<&PermissionEntry, Vec<&Permission>> = BTreeMap::new();
    for (permission, entries) in matrix.granted_entries() {
        for entry in entries {
            by_entry.entry(entry).or_default().push(permission);
        }
    }

    let identity = matrix.context().identity();
    let mut grouped: Vec<(&PermissionEntry, Vec<&Permission>)> = by_entry.into_iter().collect();
    grouped.sort_by(|a, b| identity.compare_entries(a.0, b.0));

    grouped
        .into_iter()
        .map(|(entry, permissions)| {
            let mut permissions: Vec<String> = permissions.iter().map(|p| p.short_form()).collect();
            permissions.sort();
            DefinitionEntry::new(
                entry.kind(),
                DefinitionChild {
                    name: entry.sid().to_string(),
                    permissions,
                },
            )
        })
        .collect()
}
