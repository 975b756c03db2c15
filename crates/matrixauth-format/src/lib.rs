//! # matrixauth-format
//!
//! Persistence for the matrix authorization engine:
//!
//! - [`wire`]: the bit-exact `[TYPE:]<permission>:<sid>` string form
//! - [`casc`]: grants grouped by grantee (`user` / `group` / `userOrGroup`)
//! - [`document`]: one scope's grants plus its inheritance strategy, as JSON or TOML
//! - [`config`]: the whole-configuration TOML file that builds a scope tree
//!
//! Loading never fails on an individual bad record; skipped records are
//! returned in a [`LoadReport`] and logged.

pub mod casc;
pub mod config;
pub mod document;
pub mod report;
pub mod wire;

pub use config::{ExportStyle, MatrixConfig, ScopeSection};
pub use document::PropertyDocument;
pub use report::{LoadReport, LoadWarning};
