//! Typed representation of a raw health-check snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The severity level of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The check reports no issue. Entries at this level are dropped on
    /// ingestion and never accumulated.
    Ok,
    /// The check reports a degraded but functional condition.
    Warning,
    /// The check reports a failure.
    Error,
}

impl Severity {
    /// Returns true for the "no issue" level.
    pub fn is_ok(&self) -> bool {
        matches!(self, Severity::Ok)
    }
}

/// A single health check as reported by the surrounding health subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// The severity of the check.
    pub severity: Severity,
    /// A one-line summary of the condition.
    pub summary: String,
    /// Per-instance detail lines for the condition.
    #[serde(default)]
    pub detail: Vec<String>,
}

/// A raw health snapshot: the live, not-yet-bucketed state of all checks.
///
/// This is the shape consumed by [`CheckAccumulator::add`] and the wire
/// format of the live-snapshot source.
///
/// [`CheckAccumulator::add`]: crate::models::CheckAccumulator::add
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// All checks in the snapshot, keyed by check name.
    #[serde(default)]
    pub checks: HashMap<String, HealthCheck>,
}

impl HealthSnapshot {
    /// Creates a snapshot containing a single check.
    pub fn single(name: impl Into<String>, check: HealthCheck) -> Self {
        let mut checks = HashMap::new();
        checks.insert(name.into(), check);
        Self { checks }
    }
}
