//! The health history subsystem: hourly slots, the aggregation worker, and
//! the on-demand report path.

pub mod aggregator;
pub mod report;
pub mod slot;

pub use aggregator::{AggregatorHandle, AggregatorService};
pub use report::ReportBuilder;
pub use slot::{HISTORY_KEY_PREFIX, HistorySlot, ON_DISK_VERSION, PersistedSlot};

use crate::{
    models::CheckAccumulator,
    persistence::{error::PersistenceError, traits::KeyValueStore},
};

/// Deletes every persisted history slot. Returns the number of deleted
/// records.
pub async fn clear_history<S: KeyValueStore>(store: &S) -> Result<usize, PersistenceError> {
    let keys = store.keys_with_prefix(HISTORY_KEY_PREFIX).await?;
    let count = keys.len();
    for key in keys {
        tracing::info!(key, "Clearing health history slot.");
        store.delete_state(&key).await?;
    }
    Ok(count)
}

/// Sanity check of the accumulation types: a freshly constructed
/// accumulator must hold no entries.
pub fn self_test() {
    let checks = CheckAccumulator::default();
    assert!(checks.is_empty(), "a new accumulator must start empty");
}
