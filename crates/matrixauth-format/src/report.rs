//! Per-record outcomes of a configuration load.

use std::fmt;

use serde::Serialize;

/// A record that was skipped while loading a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    /// The scope the record belonged to (`global`, `item:F/J`, `agent:a1`).
    pub scope: String,
    pub record: String,
    pub reason: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: skipped '{}': {}", self.scope, self.record, self.reason)
    }
}

/// How many grants a load applied and which records it skipped.
///
/// A skipped record never aborts the load of the surrounding scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.warnings.len()
    }

    pub(crate) fn warn(&mut self, scope: &str, record: impl Into<String>, reason: impl Into<String>) {
        self.warnings.push(LoadWarning {
            scope: scope.to_string(),
            record: record.into(),
            reason: reason.into(),
        });
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.loaded += other.loaded;
        self.warnings.extend(other.warnings);
    }
}
