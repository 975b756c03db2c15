//! Sid equivalence for users and groups.
//!
//! Each identity namespace has its own `IdStrategy`. A matrix entry matches a
//! queried sid when the two are equal under the strategy of the namespace the
//! entry's type selects.

use std::{cmp::Ordering, fmt::Debug, sync::Arc};

use matrixauth_contracts::{
    entry::{AuthorizationType, PermissionEntry},
    settings::{EngineSettings, IdStrategyKind},
};

/// Equality and ordering of identifiers within one namespace.
pub trait IdStrategy: Send + Sync + Debug {
    fn equals(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    fn compare(&self, a: &str, b: &str) -> Ordering;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CaseSensitive;

impl IdStrategy for CaseSensitive {
    fn equals(&self, a: &str, b: &str) -> bool {
        a == b
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl IdStrategy for CaseInsensitive {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase))
    }
}

fn strategy_for(kind: IdStrategyKind) -> Arc<dyn IdStrategy> {
    match kind {
        IdStrategyKind::CaseSensitive => Arc::new(CaseSensitive),
        IdStrategyKind::CaseInsensitive => Arc::new(CaseInsensitive),
    }
}

/// The pair of strategies (user, group) in force for a security realm.
#[derive(Debug, Clone)]
pub struct IdentityPolicy {
    user: Arc<dyn IdStrategy>,
    group: Arc<dyn IdStrategy>,
}

impl IdentityPolicy {
    pub fn new(user: Arc<dyn IdStrategy>, group: Arc<dyn IdStrategy>) -> Self {
        Self { user, group }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            strategy_for(settings.user_id_strategy),
            strategy_for(settings.group_id_strategy),
        )
    }

    pub fn user(&self) -> &dyn IdStrategy {
        self.user.as_ref()
    }

    pub fn group(&self) -> &dyn IdStrategy {
        self.group.as_ref()
    }

    /// The strategy for a sid tested as a user (`true`) or group (`false`).
    pub fn for_principal(&self, principal: bool) -> &dyn IdStrategy {
        if principal {
            self.user()
        } else {
            self.group()
        }
    }

    /// Order sids by the user strategy, ties broken by the group strategy.
    pub fn compare_sids(&self, a: &str, b: &str) -> Ordering {
        self.user
            .compare(a, b)
            .then_with(|| self.group.compare(a, b))
    }

    /// Order entries by type, then by sid under that type's namespace.
    pub fn compare_entries(&self, a: &PermissionEntry, b: &PermissionEntry) -> Ordering {
        a.kind().cmp(&b.kind()).then_with(|| match a.kind() {
            AuthorizationType::User => self.user.compare(a.sid(), b.sid()),
            AuthorizationType::Group => self.group.compare(a.sid(), b.sid()),
            AuthorizationType::Either => self.compare_sids(a.sid(), b.sid()),
        })
    }

    /// Return true if `entry` matches `sid` queried as `principal`.
    ///
    /// `User` and `Group` entries compare under their own namespace; an
    /// `Either` entry matches if the sid is equal under either strategy.
    pub fn matches(&self, entry: &PermissionEntry, sid: &str, principal: bool) -> bool {
        if !entry.kind().is_applicable(principal) {
            return false;
        }
        match entry.kind() {
            AuthorizationType::User => self.user.equals(entry.sid(), sid),
            AuthorizationType::Group => self.group.equals(entry.sid(), sid),
            AuthorizationType::Either => self.matches_any(entry.sid(), sid),
        }
    }

    /// Return true if the two sids are equal under the user or the group strategy.
    pub fn matches_any(&self, a: &str, b: &str) -> bool {
        self.user.equals(a, b) || self.group.equals(a, b)
    }
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}
