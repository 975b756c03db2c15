//! A resolved caller: one user sid plus the group sids it belongs to.
//!
//! Group resolution is the identity provider's job; this type only carries
//! the result.

use serde::{Deserialize, Serialize};

use crate::entry::ANONYMOUS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    name: String,
    #[serde(default)]
    groups: Vec<String>,
}

impl Authentication {
    pub fn new(name: impl Into<String>, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::user(ANONYMOUS)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }
}
