//! The background worker that folds health updates into hourly slots.
//!
//! A single worker task owns the current [`HistorySlot`] and is the sole
//! writer of persisted history records, so the slot itself needs no locking.
//! Producers hand snapshots to the worker through a cloneable
//! [`AggregatorHandle`]; the handle never blocks.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    config::AppConfig,
    history::slot::{HISTORY_KEY_PREFIX, HistorySlot, PersistedSlot},
    models::{CheckAccumulator, HealthSnapshot},
    persistence::{error::PersistenceError, traits::KeyValueStore},
};

/// A cloneable producer-side handle to the aggregation worker.
#[derive(Debug, Clone)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<HealthSnapshot>,
}

impl AggregatorHandle {
    /// Queues a raw health snapshot for the worker and wakes it.
    ///
    /// Safe to call concurrently from any task; never blocks. Updates sent
    /// after the worker has shut down are dropped with a warning.
    pub fn notify(&self, snapshot: HealthSnapshot) {
        if self.tx.send(snapshot).is_err() {
            tracing::warn!("Health update dropped: the aggregator is no longer running.");
        }
    }
}

#[cfg(test)]
impl AggregatorHandle {
    /// Wraps a raw channel sender, for tests that inspect the inbox.
    pub(crate) fn for_tests(tx: mpsc::UnboundedSender<HealthSnapshot>) -> Self {
        Self { tx }
    }
}

/// The aggregation worker.
///
/// Wakes whenever a snapshot arrives and at least once per persist period,
/// then runs one cycle: roll the slot over if its hour has passed, prune
/// records beyond the retention horizon, apply queued snapshots in arrival
/// order, and flush the slot when its deadline has passed.
pub struct AggregatorService<S: KeyValueStore> {
    /// Shared application configuration.
    config: Arc<AppConfig>,
    /// The persistent store for history records.
    store: Arc<S>,
    /// Injected time source.
    clock: Arc<dyn Clock>,
    /// The receiving end of the notification channel.
    inbox: mpsc::UnboundedReceiver<HealthSnapshot>,
    /// False once every handle has been dropped.
    inbox_open: bool,
    /// Snapshots drained from the inbox but not yet applied. Entries are
    /// applied to the current slot exactly once, in FIFO order.
    pending: Vec<HealthSnapshot>,
    /// A token used to signal a graceful shutdown.
    cancellation_token: CancellationToken,
    /// The slot covering the current hour.
    current_slot: HistorySlot,
}

impl<S: KeyValueStore> AggregatorService<S> {
    /// Creates the worker and its producer handle.
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        cancellation_token: CancellationToken,
    ) -> (Self, AggregatorHandle) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let current_slot = HistorySlot::new(clock.now(), config.persist_period());
        let service = Self {
            config,
            store,
            clock,
            inbox,
            inbox_open: true,
            pending: Vec::new(),
            cancellation_token,
            current_slot,
        };
        (service, AggregatorHandle { tx })
    }

    /// Starts the long-running worker loop.
    pub async fn run(mut self) {
        // Seed the initial slot from any record already persisted for this
        // hour, so a restart never loses written data.
        self.reset_slot().await;

        let token = self.cancellation_token.clone();
        let period = self.config.persist_interval;

        loop {
            if self.inbox_open {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        tracing::info!("Aggregator cancellation signal received, shutting down...");
                        break;
                    }

                    first = tokio::time::timeout(period, self.inbox.recv()) => {
                        match first {
                            Ok(Some(snapshot)) => self.pending.push(snapshot),
                            Ok(None) => self.inbox_open = false,
                            // Timed out: periodic wake to flush and prune.
                            Err(_) => {}
                        }
                    }
                }
            } else {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        tracing::info!("Aggregator cancellation signal received, shutting down...");
                        break;
                    }

                    _ = tokio::time::sleep(period) => {}
                }
            }

            // Drain whatever else arrived while we were waiting.
            while let Ok(snapshot) = self.inbox.try_recv() {
                self.pending.push(snapshot);
            }

            if let Err(e) = self.cycle().await {
                tracing::error!(error = %e, "Error during aggregation cycle. Retrying on next wake.");
            }
        }

        tracing::info!("Aggregator has shut down.");
    }

    /// One pass of the worker: rollover, prune, apply, flush.
    ///
    /// A store error aborts the pass; whatever was not yet applied stays in
    /// the pending queue and the pass is retried on the next wake.
    async fn cycle(&mut self) -> Result<(), PersistenceError> {
        let now = self.clock.now();

        if self.current_slot.expired(now) {
            tracing::info!(slot = %self.current_slot, "Health history slot expired.");
            self.flush_if_needed(now).await?;
            self.reset_slot().await;
        }

        self.prune_history().await?;

        if !self.pending.is_empty() {
            tracing::info!(
                updates = self.pending.len(),
                slot = %self.current_slot,
                "Applying pending health updates to slot."
            );
        }
        let now = self.clock.now();
        for snapshot in self.pending.drain(..) {
            self.current_slot.add(&snapshot, now);
        }

        self.flush_if_needed(now).await
    }

    /// Replaces the current slot with one for the hour containing "now",
    /// seeded with any state already persisted for that hour.
    ///
    /// A read failure starts the slot empty rather than stalling the worker;
    /// history is best-effort.
    async fn reset_slot(&mut self) {
        let now = self.clock.now();
        let key = HistorySlot::slot_key(now);
        let checks = match self.store.get_json_state::<PersistedSlot>(&key).await {
            Ok(Some(record)) => record.into_accumulator().unwrap_or_default(),
            Ok(None) => CheckAccumulator::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "Could not load persisted slot, starting empty.");
                CheckAccumulator::default()
            }
        };
        self.current_slot = HistorySlot::with_checks(checks, now, self.config.persist_period());
        tracing::info!(slot = %self.current_slot, "Reset current health slot.");
    }

    /// Deletes every persisted bucket older than the retention horizon.
    async fn prune_history(&self) -> Result<(), PersistenceError> {
        let cutoff = self.clock.now() - TimeDelta::hours(i64::from(self.config.retention_hours));
        for key in self.store.keys_with_prefix(HISTORY_KEY_PREFIX).await? {
            match HistorySlot::key_to_time(&key) {
                Some(ts) if ts <= cutoff => {
                    tracing::info!(key, "Removing old health slot.");
                    self.store.delete_state(&key).await?;
                }
                Some(_) => {}
                None => {
                    tracing::warn!(key, "Ignoring history key with unparseable timestamp.");
                }
            }
        }
        Ok(())
    }

    /// Persists the current slot if its flush deadline has passed.
    ///
    /// `mark_flushed` runs only after a successful write, so a failed flush
    /// is retried on the next wake.
    async fn flush_if_needed(&mut self, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        if !self.current_slot.need_flush(now) {
            return Ok(());
        }

        let key = self.current_slot.key();
        tracing::debug!(key, "Flushing dirty health slot.");
        self.store.set_json_state(&key, &self.current_slot.to_persisted()).await?;
        self.current_slot.mark_flushed();
        Ok(())
    }
}
