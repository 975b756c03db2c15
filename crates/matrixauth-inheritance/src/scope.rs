//! Addressing scopes by name.

use std::{fmt, str::FromStr};

use matrixauth_contracts::error::{MatrixAuthError, MatrixAuthResult};

/// A scope in the tree: the root, an item by full name, or an agent.
///
/// The string form is `global`, `item:<full name>`, or `agent:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeRef {
    Global,
    Item(String),
    Agent(String),
}

impl ScopeRef {
    pub fn item(full_name: impl Into<String>) -> Self {
        ScopeRef::Item(full_name.into())
    }

    pub fn agent(name: impl Into<String>) -> Self {
        ScopeRef::Agent(name.into())
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeRef::Global => f.write_str("global"),
            ScopeRef::Item(name) => write!(f, "item:{}", name),
            ScopeRef::Agent(name) => write!(f, "agent:{}", name),
        }
    }
}

impl FromStr for ScopeRef {
    type Err = MatrixAuthError;

    fn from_str(s: &str) -> MatrixAuthResult<Self> {
        if s == "global" {
            return Ok(ScopeRef::Global);
        }
        let invalid = || MatrixAuthError::ConfigError {
            reason: format!("invalid scope '{}': expected global, item:<name> or agent:<name>", s),
        };
        let (kind, name) = s.split_once(':').ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        match kind {
            "item" => Ok(ScopeRef::Item(name.to_string())),
            "agent" => Ok(ScopeRef::Agent(name.to_string())),
            _ => Err(invalid()),
        }
    }
}

/// The full name of the item containing `full_name`, if it is nested.
pub fn parent_name(full_name: &str) -> Option<&str> {
    full_name.rsplit_once('/').map(|(parent, _)| parent)
}
