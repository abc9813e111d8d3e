//! Consumed provider interfaces.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::HealthSnapshot;

/// Errors that can occur while fetching the live snapshot.
#[derive(Debug, Error)]
pub enum SnapshotSourceError {
    /// The snapshot could not be read.
    #[error("Failed to read snapshot: {0}")]
    Io(String),

    /// The snapshot could not be decoded.
    #[error("Failed to decode snapshot: {0}")]
    Decode(String),
}

/// A source for the live, not-yet-bucketed health state.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the current health snapshot.
    async fn live_snapshot(&self) -> Result<HealthSnapshot, SnapshotSourceError>;
}

/// Errors that can occur while fetching crash history.
///
/// A failure here never aborts a report; the report builder converts it into
/// a degraded health check.
#[derive(Debug, Error)]
pub enum CrashHistoryError {
    /// Crash data could not be read.
    #[error("Failed to read crash data: {0}")]
    Io(String),

    /// Crash data could not be decoded.
    #[error("Failed to decode crash data: {0}")]
    Decode(String),
}

/// A provider of structured crash history.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CrashHistoryProvider: Send + Sync {
    /// Returns the crashes recorded within the past `hours`.
    async fn crash_history(&self, hours: u32) -> Result<serde_json::Value, CrashHistoryError>;
}
