//! Process-wide engine settings.
//!
//! Read from the `[settings]` table of a configuration file. Every field has a
//! default so an empty table (or no table) is valid.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable that overrides `enable_dangerous_permissions`.
pub const ENABLE_DANGEROUS_PERMISSIONS_ENV: &str = "MATRIXAUTH_ENABLE_DANGEROUS_PERMISSIONS";

/// How sids in one identity namespace are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdStrategyKind {
    CaseSensitive,
    CaseInsensitive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Let direct grants of dangerous permissions take effect instead of
    /// requiring Administer. Off unless explicitly opted in.
    pub enable_dangerous_permissions: bool,

    /// Only grant item Read/Discover on a nested item if the parent item
    /// grants them as well.
    pub check_parent_permissions: bool,

    pub user_id_strategy: IdStrategyKind,

    pub group_id_strategy: IdStrategyKind,

    /// Track legacy untyped entries for the ambiguity monitor.
    pub ambiguity_monitor: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enable_dangerous_permissions: false,
            check_parent_permissions: false,
            user_id_strategy: IdStrategyKind::CaseInsensitive,
            group_id_strategy: IdStrategyKind::CaseInsensitive,
            ambiguity_monitor: true,
        }
    }
}

impl EngineSettings {
    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENABLE_DANGEROUS_PERMISSIONS_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => self.enable_dangerous_permissions = true,
                "false" | "0" | "no" => self.enable_dangerous_permissions = false,
                other => warn!(
                    variable = ENABLE_DANGEROUS_PERMISSIONS_ENV,
                    value = %other,
                    "ignoring unrecognized boolean override"
                ),
            }
        }
        self
    }
}
