//! On-demand consolidated reporting.
//!
//! The report path is a read-only projection: it loads persisted history
//! slots and the live snapshot, merges them, and never touches the
//! aggregation worker's state.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    clock::Clock,
    history::slot::{HistorySlot, PersistedSlot},
    models::{
        CheckAccumulator, CrashReport, HealthCheck, HealthReport, HealthSnapshot, InsightsReport,
        Severity,
    },
    persistence::{error::PersistenceError, traits::KeyValueStore},
    providers::traits::{CrashHistoryProvider, SnapshotSource, SnapshotSourceError},
};

/// Check name injected when crash history cannot be fetched.
pub const CRASH_INFO_MISSING_CHECK: &str = "HEALTH_MISSING_CRASH_INFO";

/// Errors that can occur while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The persistence gateway failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The live snapshot could not be fetched. Unlike crash history, the
    /// live snapshot is the report's primary subject, so this is fatal.
    #[error("Live snapshot error: {0}")]
    Snapshot(#[from] SnapshotSourceError),
}

/// Builds consolidated reports from persisted history, the live snapshot,
/// and the crash-history provider.
pub struct ReportBuilder<S: KeyValueStore> {
    store: Arc<S>,
    snapshots: Arc<dyn SnapshotSource>,
    crashes: Arc<dyn CrashHistoryProvider>,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> ReportBuilder<S> {
    /// Creates a new report builder over the given collaborators.
    pub fn new(
        store: Arc<S>,
        snapshots: Arc<dyn SnapshotSource>,
        crashes: Arc<dyn CrashHistoryProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, snapshots, crashes, clock }
    }

    /// Builds the consolidated health section for the past `hours`.
    ///
    /// Absent buckets are normal (restart, pruning, first run) and count as
    /// empty; so do malformed or version-mismatched records, with a warning.
    pub async fn health_report(&self, hours: u32) -> Result<HealthReport, ReportError> {
        let mut history = CheckAccumulator::default();

        for key in HistorySlot::key_range(self.clock.now(), hours) {
            match self.store.get_json_state::<PersistedSlot>(&key).await {
                Ok(Some(record)) => {
                    if let Some(checks) = record.into_accumulator() {
                        history.merge(&checks);
                    }
                }
                Ok(None) => {
                    tracing::debug!(key, "No persisted slot for bucket.");
                }
                Err(PersistenceError::SerializationError(e)) => {
                    tracing::warn!(key, error = %e, "Skipping undecodable history slot.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Fold in the current health. Passing the snapshot through an
        // accumulator drops no-issue checks and deduplicates strings.
        let live = self.snapshots.live_snapshot().await?;
        let mut current = CheckAccumulator::default();
        current.add(&live);
        history.merge(&current);

        Ok(HealthReport { current, history })
    }

    /// Builds a full report: crash history plus consolidated health.
    ///
    /// A crash-provider failure degrades the report instead of failing it:
    /// the crash section carries no summary and a warning-severity
    /// [`CRASH_INFO_MISSING_CHECK`] entry is merged into the health section.
    pub async fn build_report(
        &self,
        health_hours: u32,
        crash_hours: u32,
    ) -> Result<InsightsReport, ReportError> {
        let mut health = self.health_report(health_hours).await?;

        let crashes = match self.crashes.crash_history(crash_hours).await {
            Ok(summary) => CrashReport { hours: crash_hours, summary: Some(summary) },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch crash history.");
                let degraded = HealthSnapshot::single(
                    CRASH_INFO_MISSING_CHECK,
                    HealthCheck {
                        severity: Severity::Warning,
                        summary: "failed to fetch crash history".to_string(),
                        detail: vec![e.to_string()],
                    },
                );
                health.current.add(&degraded);
                health.history.add(&degraded);
                CrashReport { hours: crash_hours, summary: None }
            }
        };

        Ok(InsightsReport {
            generated_at: self.clock.now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            crashes,
            health,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use serde_json::json;

    use super::*;
    use crate::{
        history::slot::ON_DISK_VERSION,
        persistence::traits::MockKeyValueStore,
        providers::traits::{
            CrashHistoryError, MockCrashHistoryProvider, MockSnapshotSource,
        },
        test_helpers::{ManualClock, snapshot, utc},
    };

    fn accumulated(snaps: &[HealthSnapshot]) -> CheckAccumulator {
        let mut acc = CheckAccumulator::default();
        for snap in snaps {
            acc.add(snap);
        }
        acc
    }

    fn persisted(checks: CheckAccumulator) -> PersistedSlot {
        PersistedSlot { version: ON_DISK_VERSION, checks }
    }

    struct TestHarness {
        store: MockKeyValueStore,
        snapshots: MockSnapshotSource,
        crashes: MockCrashHistoryProvider,
        clock: Arc<ManualClock>,
    }

    impl TestHarness {
        fn new() -> Self {
            Self {
                store: MockKeyValueStore::new(),
                snapshots: MockSnapshotSource::new(),
                crashes: MockCrashHistoryProvider::new(),
                clock: Arc::new(ManualClock::new(utc(2018, 11, 5, 12, 30, 0))),
            }
        }

        fn build(self) -> ReportBuilder<MockKeyValueStore> {
            ReportBuilder::new(
                Arc::new(self.store),
                Arc::new(self.snapshots),
                Arc::new(self.crashes),
                self.clock,
            )
        }
    }

    #[tokio::test]
    async fn test_health_report_merges_persisted_slots_and_live_snapshot() {
        let mut harness = TestHarness::new();

        let hour_a = accumulated(&[snapshot("OSD_DOWN", Severity::Warning, "osd.1 down", &[])]);
        let hour_b = accumulated(&[snapshot("OSD_DOWN", Severity::Warning, "osd.2 down", &[])]);

        harness
            .store
            .expect_get_json_state::<PersistedSlot>()
            .with(eq("health_history/2018-11-05_12".to_string()))
            .times(1)
            .returning(move |_| Ok(Some(persisted(hour_a.clone()))));
        harness
            .store
            .expect_get_json_state::<PersistedSlot>()
            .with(eq("health_history/2018-11-05_11".to_string()))
            .times(1)
            .returning(move |_| Ok(Some(persisted(hour_b.clone()))));

        harness
            .snapshots
            .expect_live_snapshot()
            .times(1)
            .returning(|| Ok(snapshot("PG_DEGRADED", Severity::Error, "pgs degraded", &[])));

        let report = harness.build().health_report(2).await.unwrap();

        let osd = &report.history.checks()["OSD_DOWN"][&Severity::Warning];
        assert_eq!(osd.summary.len(), 2);
        assert!(report.history.checks().contains_key("PG_DEGRADED"));
        // The current section only carries the live snapshot.
        assert_eq!(report.current.len(), 1);
        assert!(report.current.checks().contains_key("PG_DEGRADED"));
    }

    #[tokio::test]
    async fn test_health_report_treats_gaps_and_garbage_as_empty() {
        let mut harness = TestHarness::new();

        harness
            .store
            .expect_get_json_state::<PersistedSlot>()
            .times(1)
            .returning(|_| Ok(None));
        harness.store.expect_get_json_state::<PersistedSlot>().times(1).returning(|_| {
            Err(PersistenceError::SerializationError("bad json".into()))
        });
        // Version mismatch is discarded like a gap.
        harness.store.expect_get_json_state::<PersistedSlot>().times(1).returning(|_| {
            Ok(Some(PersistedSlot {
                version: ON_DISK_VERSION + 1,
                checks: accumulated(&[snapshot("STALE", Severity::Error, "stale", &[])]),
            }))
        });

        harness
            .snapshots
            .expect_live_snapshot()
            .times(1)
            .returning(|| Ok(HealthSnapshot::default()));

        let report = harness.build().health_report(3).await.unwrap();
        assert!(report.history.is_empty());
        assert!(report.current.is_empty());
    }

    #[tokio::test]
    async fn test_health_report_filters_ok_checks_from_current() {
        let mut harness = TestHarness::new();

        harness
            .store
            .expect_get_json_state::<PersistedSlot>()
            .returning(|_| Ok(None));
        harness
            .snapshots
            .expect_live_snapshot()
            .times(1)
            .returning(|| Ok(snapshot("POOL_OK", Severity::Ok, "all good", &[])));

        let report = harness.build().health_report(24).await.unwrap();
        assert!(report.current.is_empty());
        assert!(report.history.is_empty());
    }

    #[tokio::test]
    async fn test_build_report_includes_crash_summary() {
        let mut harness = TestHarness::new();

        harness.store.expect_get_json_state::<PersistedSlot>().returning(|_| Ok(None));
        harness
            .snapshots
            .expect_live_snapshot()
            .returning(|| Ok(HealthSnapshot::default()));
        harness
            .crashes
            .expect_crash_history()
            .with(eq(24))
            .times(1)
            .returning(|_| Ok(json!([{"crash_id": "abc", "timestamp": "2018-11-05T10:00:00Z"}])));

        let report = harness.build().build_report(1, 24).await.unwrap();

        assert_eq!(report.crashes.hours, 24);
        assert!(report.crashes.summary.is_some());
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
        assert!(!report.health.history.checks().contains_key(CRASH_INFO_MISSING_CHECK));
    }

    #[tokio::test]
    async fn test_build_report_degrades_on_crash_provider_failure() {
        let mut harness = TestHarness::new();

        harness.store.expect_get_json_state::<PersistedSlot>().returning(|_| Ok(None));
        harness
            .snapshots
            .expect_live_snapshot()
            .returning(|| Ok(HealthSnapshot::default()));
        harness
            .crashes
            .expect_crash_history()
            .times(1)
            .returning(|_| Err(CrashHistoryError::Io("permission denied".into())));

        let report = harness.build().build_report(1, 24).await.unwrap();

        assert!(report.crashes.summary.is_none());
        let degraded = &report.health.history.checks()[CRASH_INFO_MISSING_CHECK];
        let entry = &degraded[&Severity::Warning];
        assert!(entry.summary.contains("failed to fetch crash history"));
        assert_eq!(entry.detail.len(), 1);
    }

    #[tokio::test]
    async fn test_health_report_propagates_store_io_errors() {
        let mut harness = TestHarness::new();

        harness.store.expect_get_json_state::<PersistedSlot>().times(1).returning(|_| {
            Err(PersistenceError::OperationFailed("io".into()))
        });

        let result = harness.build().health_report(1).await;
        assert!(matches!(result, Err(ReportError::Persistence(_))));
    }
}
