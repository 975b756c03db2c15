//! # matrixauth-monitor
//!
//! Operator-facing monitors. Neither affects an access decision.
//!
//! - [`ambiguity::AmbiguityMonitor`] tracks scopes with legacy untyped grants.
//! - [`dangerous::DangerousPermissionsMonitor`] reports dangerous permissions
//!   granted without Administer.

pub mod ambiguity;
pub mod dangerous;

pub use ambiguity::{has_ambiguous_entries, AmbiguityMonitor, AmbiguityRecord, ScopeCategory};
pub use dangerous::DangerousPermissionsMonitor;
