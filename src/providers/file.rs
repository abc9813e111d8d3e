//! File-based snapshot provider.
//!
//! The surrounding health subsystem writes its current state to a JSON file;
//! [`FileSnapshotSource`] reads it on demand and [`SnapshotWatcher`] polls it
//! in the background, notifying the aggregator whenever it changes.

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    history::AggregatorHandle,
    models::HealthSnapshot,
    providers::traits::{SnapshotSource, SnapshotSourceError},
};

/// Reads the live health snapshot from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    /// Creates a source for the given snapshot file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn live_snapshot(&self) -> Result<HealthSnapshot, SnapshotSourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SnapshotSourceError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| SnapshotSourceError::Decode(e.to_string()))
    }
}

/// Polls the snapshot file and forwards changed snapshots to the aggregator.
///
/// Change detection is by file modification time, so an unchanged file costs
/// one `stat` per poll rather than a read and parse.
pub struct SnapshotWatcher {
    source: FileSnapshotSource,
    handle: AggregatorHandle,
    poll_interval: Duration,
    cancellation_token: CancellationToken,
    last_modified: Option<SystemTime>,
}

impl SnapshotWatcher {
    /// Creates a watcher that feeds the given aggregator handle.
    pub fn new(
        source: FileSnapshotSource,
        handle: AggregatorHandle,
        poll_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { source, handle, poll_interval, cancellation_token, last_modified: None }
    }

    /// Starts the long-running polling loop.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Snapshot watcher cancellation signal received, shutting down...");
                    break;
                }

                _ = tokio::time::sleep(self.poll_interval) => {
                    self.poll_once().await;
                }
            }
        }
        tracing::info!("Snapshot watcher has shut down.");
    }

    /// One poll: read the snapshot if the file changed since last time.
    async fn poll_once(&mut self) {
        let modified = match tokio::fs::metadata(self.source.path()).await {
            Ok(meta) => meta.modified().ok(),
            // A missing file is normal before the first snapshot is written.
            Err(e) => {
                tracing::debug!(path = %self.source.path().display(), error = %e,
                    "Snapshot file not readable.");
                return;
            }
        };

        let changed = match (self.last_modified, modified) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(current)) => current > last,
        };
        if !changed {
            return;
        }

        match self.source.live_snapshot().await {
            Ok(snapshot) => {
                self.last_modified = modified;
                tracing::debug!(checks = snapshot.checks.len(), "Snapshot file changed.");
                self.handle.notify(snapshot);
            }
            Err(e) => {
                // Leave last_modified untouched so the next poll retries;
                // the writer may have been mid-write.
                tracing::warn!(error = %e, "Failed to read changed snapshot file.");
            }
        }
    }
}
