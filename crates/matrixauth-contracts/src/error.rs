//! Error types for the matrix authorization engine.
//!
//! Access decisions never fail: a missing grant is a `false`, not an error.
//! Errors are reserved for registry construction, configuration parsing, and
//! lookups of things that do not exist.

use thiserror::Error;

/// The unified error type for the matrix authorization crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixAuthError {
    /// No permission is registered under the given identifier or short form.
    #[error("no such permission: '{id}'")]
    UnknownPermission { id: String },

    /// A permission with the same identifier was already registered.
    #[error("permission '{id}' is already registered")]
    DuplicatePermission { id: String },

    /// A permission names an implying parent that is not part of the registry.
    #[error("permission '{id}' is implied by '{parent}', which is not registered")]
    UnknownParent { id: String, parent: String },

    /// A permission definition violates a registry invariant.
    #[error("invalid permission definition: {reason}")]
    InvalidDefinition { reason: String },

    /// A string-form grant could not be parsed.
    #[error("failed to parse grant '{input}': {reason}")]
    ParseError { input: String, reason: String },

    /// The permission exists but does not apply to the container it was added to.
    #[error("permission '{permission}' is not applicable to {scope}")]
    InapplicablePermission { permission: String, scope: String },

    /// A configuration document is missing, unreadable, or malformed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A scope (item or agent) lookup by name failed.
    #[error("no such {kind}: '{name}'")]
    UnknownScope { kind: String, name: String },
}

/// Convenience alias used throughout the matrix authorization crates.
pub type MatrixAuthResult<T> = Result<T, MatrixAuthError>;
