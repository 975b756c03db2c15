//! Grant targets: a sid tagged as a user, a group, or either.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MatrixAuthError, MatrixAuthResult};

/// The pseudo-identity of unauthenticated callers.
pub const ANONYMOUS: &str = "anonymous";

/// How a sid in a grant is to be interpreted.
///
/// `Either` is the legacy, untyped form: the sid matches a user or a group of
/// that name. Ordering is `User < Group < Either`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationType {
    User,
    Group,
    Either,
}

impl AuthorizationType {
    /// The wire prefix for this type. Legacy `Either` grants carry none.
    pub fn prefix(self) -> &'static str {
        match self {
            AuthorizationType::User => "USER:",
            AuthorizationType::Group => "GROUP:",
            AuthorizationType::Either => "",
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            AuthorizationType::User => "USER",
            AuthorizationType::Group => "GROUP",
            AuthorizationType::Either => "EITHER",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<AuthorizationType> {
        match keyword {
            "USER" => Some(AuthorizationType::User),
            "GROUP" => Some(AuthorizationType::Group),
            "EITHER" => Some(AuthorizationType::Either),
            _ => None,
        }
    }

    /// Whether an entry of this type can match a sid tested as a user
    /// (`principal = true`) or as a group (`principal = false`).
    pub fn is_applicable(self, principal: bool) -> bool {
        match self {
            AuthorizationType::User => principal,
            AuthorizationType::Group => !principal,
            AuthorizationType::Either => true,
        }
    }
}

/// A `(type, sid)` pair recording who a permission is granted to.
///
/// Compared and ordered on `(type, sid)`. The sid is never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct PermissionEntry {
    #[serde(rename = "type")]
    kind: AuthorizationType,
    sid: String,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "type")]
    kind: AuthorizationType,
    sid: String,
}

impl TryFrom<RawEntry> for PermissionEntry {
    type Error = MatrixAuthError;

    fn try_from(raw: RawEntry) -> MatrixAuthResult<Self> {
        PermissionEntry::try_new(raw.kind, raw.sid)
    }
}

impl PermissionEntry {
    /// Create an entry.
    ///
    /// # Panics
    ///
    /// Panics if `sid` is empty. Use [`PermissionEntry::try_new`] for
    /// untrusted input.
    pub fn new(kind: AuthorizationType, sid: impl Into<String>) -> Self {
        let sid = sid.into();
        assert!(!sid.is_empty(), "permission entry sid must not be empty");
        Self { kind, sid }
    }

    pub fn try_new(kind: AuthorizationType, sid: impl Into<String>) -> MatrixAuthResult<Self> {
        let sid = sid.into();
        if sid.is_empty() {
            return Err(MatrixAuthError::ParseError {
                input: format!("{}:", kind.keyword()),
                reason: "sid must not be empty".to_string(),
            });
        }
        Ok(Self { kind, sid })
    }

    pub fn user(sid: impl Into<String>) -> Self {
        Self::new(AuthorizationType::User, sid)
    }

    pub fn group(sid: impl Into<String>) -> Self {
        Self::new(AuthorizationType::Group, sid)
    }

    pub fn either(sid: impl Into<String>) -> Self {
        Self::new(AuthorizationType::Either, sid)
    }

    pub fn kind(&self) -> AuthorizationType {
        self.kind
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn is_ambiguous(&self) -> bool {
        self.kind == AuthorizationType::Either
    }
}

impl fmt::Display for PermissionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.keyword(), self.sid)
    }
}
