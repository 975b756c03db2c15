//! # matrixauth-contracts
//!
//! Shared types, settings, and error contracts for the matrix authorization
//! engine.
//!
//! All crates in the workspace import from here. No decision logic lives in
//! this crate, only data definitions and error types.

pub mod authentication;
pub mod decision;
pub mod entry;
pub mod error;
pub mod permission;
pub mod settings;

pub use authentication::Authentication;
pub use decision::Decision;
pub use entry::{AuthorizationType, PermissionEntry, ANONYMOUS};
pub use error::{MatrixAuthError, MatrixAuthResult};
pub use permission::{Permission, PermissionScope, PermissionSpec};
pub use settings::{EngineSettings, IdStrategyKind};
