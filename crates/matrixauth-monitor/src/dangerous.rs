//! Reporting of dangerous permissions granted directly instead of through
//! Administer.
//!
//! While the escape hatch is off, such grants have no effect beyond what
//! Administer already gives, so they usually indicate a configuration the
//! operator did not intend.

use std::sync::Arc;

use tracing::warn;

use matrixauth_contracts::entry::ANONYMOUS;
use matrixauth_core::{matrix::AuthorizationMatrix, registry::PermissionRegistry};

#[derive(Debug, Clone)]
pub struct DangerousPermissionsMonitor {
    registry: Arc<PermissionRegistry>,
}

impl DangerousPermissionsMonitor {
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self { registry }
    }

    /// The deprecated process-wide opt-in is set.
    pub fn is_escape_hatch_enabled(&self) -> bool {
        self.registry.dangerous_permissions_enabled()
    }

    /// Sids (including `anonymous`) holding a dangerous permission directly
    /// without holding Administer.
    pub fn sids_with_dangerous_permissions(&self, matrix: &AuthorizationMatrix) -> Vec<String> {
        let administer = self.registry.administer();
        let identity = matrix.context().identity();
        let dangerous: Vec<_> = self.registry.dangerous().collect();

        let mut sids = matrix.all_granted_sids();
        sids.push(ANONYMOUS.to_string());
        sids.retain(|sid| {
            let admin = matrix.has_permission(sid, administer, true)
                || matrix.has_permission(sid, administer, false);
            !admin
                && dangerous.iter().any(|p| {
                    matrix
                        .grants(p)
                        .any(|entry| identity.matches_any(entry.sid(), sid))
                })
        });
        sids
    }

    /// True when the escape hatch is off and some sid holds a dangerous
    /// permission without Administer.
    pub fn is_activated(&self, matrix: &AuthorizationMatrix) -> bool {
        if self.is_escape_hatch_enabled() {
            return false;
        }
        let sids = self.sids_with_dangerous_permissions(matrix);
        if sids.is_empty() {
            return false;
        }
        warn!(?sids, "dangerous permissions granted without Administer have no effect");
        true
    }
}
