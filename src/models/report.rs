//! Report structures returned by the on-demand read path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::accumulator::CheckAccumulator;

/// The consolidated health section of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// The live snapshot, deduplicated and with no-issue checks filtered out.
    pub current: CheckAccumulator,
    /// The last N hours of persisted history merged with the live snapshot.
    pub history: CheckAccumulator,
}

/// The crash-history section of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashReport {
    /// The number of hours the summary covers.
    pub hours: u32,
    /// Structured crash data, or `None` when the provider failed. A failed
    /// provider also surfaces as a degraded health check in the health
    /// section.
    pub summary: Option<serde_json::Value>,
}

/// A full report: crash history plus consolidated health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// The version of the service that produced the report.
    pub version: String,
    /// The crash-history section.
    pub crashes: CrashReport,
    /// The health section.
    pub health: HealthReport,
}
