//! The string form of a single grant.
//!
//! ```text
//! USER:hudson.model.Item.Build:alice     typed user grant
//! GROUP:hudson.model.Item.Read:devs      typed group grant
//! EITHER:hudson.model.Item.Read:ops      explicitly untyped
//! hudson.model.Item.Read:ops             legacy untyped (no prefix)
//! ```
//!
//! The permission part may also be a short form such as `Job/Read`. The sid
//! is everything after the permission's colon and may itself contain colons.

use std::sync::Arc;

use tracing::warn;

use matrixauth_contracts::{
    entry::{AuthorizationType, PermissionEntry},
    error::{MatrixAuthError, MatrixAuthResult},
    permission::{Permission, PermissionScope},
};
use matrixauth_core::{
    matrix::{AuthorizationMatrix, MatrixBuilder},
    registry::PermissionRegistry,
};

use crate::report::LoadReport;

/// One parsed grant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGrant {
    pub permission: Permission,
    pub entry: PermissionEntry,
    /// The record had no type prefix at all.
    pub legacy: bool,
}

/// Parse one `[TYPE:]<permission>:<sid>` record.
pub fn parse_grant(registry: &PermissionRegistry, record: &str) -> MatrixAuthResult<ParsedGrant> {
    let malformed = |reason: &str| MatrixAuthError::ParseError {
        input: record.to_string(),
        reason: reason.to_string(),
    };

    let (kind, rest, legacy) = match record.split_once(':') {
        Some((keyword, rest)) => match AuthorizationType::from_keyword(keyword) {
            Some(kind) => (kind, rest, false),
            None => (AuthorizationType::Either, record, true),
        },
        None => return Err(malformed("expected '<permission>:<sid>'")),
    };
    let (id, sid) = rest
        .split_once(':')
        .ok_or_else(|| malformed("expected '<permission>:<sid>'"))?;
    if sid.is_empty() {
        return Err(malformed("sid must not be empty"));
    }
    let permission = registry.permission(id)?;

    Ok(ParsedGrant {
        permission,
        entry: PermissionEntry::new(kind, sid),
        legacy,
    })
}

/// `<prefix><permission id>:<sid>`. Untyped entries carry no prefix.
pub fn format_grant(permission: &Permission, entry: &PermissionEntry) -> String {
    format!("{}{}:{}", entry.kind().prefix(), permission.id(), entry.sid())
}

/// Every grant of `matrix` in string form, ordered by permission id and then
/// by entry under the matrix's identity comparator.
pub fn serialize_matrix(matrix: &AuthorizationMatrix) -> Vec<String> {
    let identity = matrix.context().identity();
    let mut records = Vec::new();
    for (permission, entries) in matrix.granted_entries() {
        let mut entries: Vec<&PermissionEntry> = entries.iter().collect();
        entries.sort_by(|a, b| identity.compare_entries(a, b));
        records.extend(entries.into_iter().map(|entry| format_grant(permission, entry)));
    }
    records
}

/// Add every valid record to `builder`.
///
/// Unknown permissions, malformed records and permissions that do not apply
/// to `scope` are skipped and reported; they never fail the load.
pub fn load_grants<'a>(
    builder: &mut MatrixBuilder,
    scope: PermissionScope,
    label: &str,
    records: impl IntoIterator<Item = &'a str>,
) -> LoadReport {
    let registry = Arc::clone(builder.context().registry());
    let mut report = LoadReport::default();
    let mut legacy = 0usize;

    for record in records {
        let parsed = match parse_grant(&registry, record) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(scope = label, record, error = %e, "skipping grant record");
                report.warn(label, record, e.to_string());
                continue;
            }
        };
        if !parsed.permission.is_contained_by(scope) {
            let e = MatrixAuthError::InapplicablePermission {
                permission: parsed.permission.id().to_string(),
                scope: scope.to_string(),
            };
            warn!(scope = label, record, error = %e, "skipping grant record");
            report.warn(label, record, e.to_string());
            continue;
        }
        if parsed.legacy {
            legacy += 1;
        }
        builder.add(&parsed.permission, parsed.entry);
        report.loaded += 1;
    }

    if legacy > 0 {
        warn!(
            scope = label,
            count = legacy,
            "loaded grants in the legacy untyped format; prefix them with USER: or GROUP:"
        );
    }
    report
}
