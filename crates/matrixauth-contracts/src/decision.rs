//! The two-valued result of consulting one ACL.
//!
//! A single matrix either grants a permission or has nothing to say about it.
//! Composition across scopes is done by the inheritance strategies, which
//! combine `Decision`s explicitly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Grant,
    Abstain,
}

impl Decision {
    pub fn is_granted(self) -> bool {
        self == Decision::Grant
    }

    /// `Grant` if `self` grants, otherwise whatever `next` decides.
    pub fn or_else(self, next: impl FnOnce() -> Decision) -> Decision {
        match self {
            Decision::Grant => Decision::Grant,
            Decision::Abstain => next(),
        }
    }

    /// `Grant` only if both `self` and `other` grant.
    pub fn and_then(self, other: impl FnOnce() -> Decision) -> Decision {
        match self {
            Decision::Grant => other(),
            Decision::Abstain => Decision::Abstain,
        }
    }
}

impl From<bool> for Decision {
    fn from(granted: bool) -> Self {
        if granted {
            Decision::Grant
        } else {
            Decision::Abstain
        }
    }
}
