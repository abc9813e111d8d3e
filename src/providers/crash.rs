//! Crash history from a directory of JSON crash dumps.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::{
    clock::Clock,
    providers::traits::{CrashHistoryError, CrashHistoryProvider},
};

/// The subset of a crash dump this provider interprets.
#[derive(Debug, Deserialize)]
struct CrashDump {
    timestamp: DateTime<Utc>,
}

/// Reads crash dumps from a directory, one JSON object per `.json` file,
/// each carrying at least a `timestamp` field.
#[derive(Clone)]
pub struct DirCrashHistory {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl DirCrashHistory {
    /// Creates a provider over the given dump directory.
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self { dir: dir.into(), clock }
    }
}

#[async_trait]
impl CrashHistoryProvider for DirCrashHistory {
    /// Returns the dumps whose timestamp falls within the past `hours`,
    /// as a JSON array.
    ///
    /// A dump that cannot be decoded fails the whole call: silently
    /// omitting crashes would defeat the point of the report.
    async fn crash_history(&self, hours: u32) -> Result<serde_json::Value, CrashHistoryError> {
        let cutoff = self.clock.now() - TimeDelta::hours(i64::from(hours));
        let mut crashes = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CrashHistoryError::Io(e.to_string()))?;

        while let Some(entry) =
            entries.next_entry().await.map_err(|e| CrashHistoryError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CrashHistoryError::Io(e.to_string()))?;
            let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                CrashHistoryError::Decode(format!("{}: {}", path.display(), e))
            })?;
            let dump: CrashDump = serde_json::from_value(value.clone()).map_err(|e| {
                CrashHistoryError::Decode(format!("{}: {}", path.display(), e))
            })?;

            if dump.timestamp >= cutoff {
                crashes.push(value);
            }
        }

        tracing::debug!(count = crashes.len(), hours, "Collected crash history.");
        Ok(serde_json::Value::Array(crashes))
    }
}

impl std::fmt::Debug for DirCrashHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirCrashHistory").field("dir", &self.dir).finish_non_exhaustive()
    }
}
