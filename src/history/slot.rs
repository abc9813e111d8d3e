//! Life cycle of one health history time slot.
//!
//! A time slot is a fixed slice of wall-clock time (one UTC hour, from :00
//! to :59); all health updates observed during that hour are deduplicated
//! together. A slot starts clean and becomes dirty when a new check string is
//! observed. The slot should be persisted when [`HistorySlot::need_flush`]
//! returns true; once persisted, the caller resets the dirty bit with
//! [`HistorySlot::mark_flushed`].
//!
//! The type performs no I/O and never reads the system clock: every
//! time-dependent operation takes the current time as a parameter.

use chrono::{DateTime, DurationRound, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CheckAccumulator, HealthSnapshot};

/// On-disk key prefix for persisted history slots.
pub const HISTORY_KEY_PREFIX: &str = "health_history/";

/// Version tag for the persisted slot format.
pub const ON_DISK_VERSION: u32 = 1;

/// Key timestamp layout, e.g. `2018-11-05_00`.
const KEY_TIME_FORMAT: &str = "%Y-%m-%d_%H";

/// The record written to the store for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSlot {
    /// Schema version of the record.
    pub version: u32,
    /// The deduplicated checks observed during the slot's hour.
    pub checks: CheckAccumulator,
}

impl PersistedSlot {
    /// Unwraps the record into its accumulator.
    ///
    /// A record carrying an unknown version is discarded: history is
    /// best-effort and a gap is preferable to misreading an incompatible
    /// shape.
    pub fn into_accumulator(self) -> Option<CheckAccumulator> {
        if self.version != ON_DISK_VERSION {
            tracing::warn!(
                version = self.version,
                expected = ON_DISK_VERSION,
                "Discarding persisted slot with unknown on-disk version."
            );
            return None;
        }
        Some(self.checks)
    }
}

/// One hour-aligned accumulation window with dirty/flush tracking.
#[derive(Debug, Clone)]
pub struct HistorySlot {
    checks: CheckAccumulator,
    /// The hour bucket this slot covers.
    bucket: DateTime<Utc>,
    /// Set the instant the slot turns dirty; cleared by `mark_flushed`.
    next_flush: Option<DateTime<Utc>>,
    /// Delay between the first unflushed change and the scheduled flush.
    persist_period: TimeDelta,
}

impl HistorySlot {
    /// Creates an empty slot for the hour containing `now`.
    pub fn new(now: DateTime<Utc>, persist_period: TimeDelta) -> Self {
        Self::with_checks(CheckAccumulator::default(), now, persist_period)
    }

    /// Creates a slot for the hour containing `now`, seeded with already
    /// persisted checks so a restart or rollover never loses written data.
    pub fn with_checks(
        checks: CheckAccumulator,
        now: DateTime<Utc>,
        persist_period: TimeDelta,
    ) -> Self {
        Self { checks, bucket: Self::bucket_of(now), next_flush: None, persist_period }
    }

    /// Folds a raw snapshot into the slot. When the slot transitions from
    /// clean to dirty, a target flush time is scheduled.
    pub fn add(&mut self, snapshot: &HealthSnapshot, now: DateTime<Utc>) -> bool {
        let changed = self.checks.add(snapshot);
        if changed && self.next_flush.is_none() {
            self.next_flush = Some(now + self.persist_period);
        }
        changed
    }

    /// True once wall-clock time has moved past this slot's hour.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.bucket != Self::bucket_of(now)
    }

    /// True if this slot has unflushed changes whose flush deadline has
    /// passed, or unflushed changes on an expired slot. Expiry forces an
    /// out-of-schedule flush so no dirty data crosses an hour boundary
    /// unpersisted.
    pub fn need_flush(&self, now: DateTime<Utc>) -> bool {
        match self.next_flush {
            Some(deadline) => deadline <= now || self.expired(now),
            None => false,
        }
    }

    /// Resets the dirty bit. The caller persists the state first; this
    /// performs no I/O.
    pub fn mark_flushed(&mut self) {
        self.next_flush = None;
    }

    /// The store key identifying this slot.
    pub fn key(&self) -> String {
        Self::slot_key(self.bucket)
    }

    /// The accumulated checks of this slot.
    pub fn accumulator(&self) -> &CheckAccumulator {
        &self.checks
    }

    /// The record to persist for this slot.
    pub fn to_persisted(&self) -> PersistedSlot {
        PersistedSlot { version: ON_DISK_VERSION, checks: self.checks.clone() }
    }

    /// Truncates a timestamp to the start of its UTC hour.
    pub fn bucket_of(ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.duration_trunc(TimeDelta::hours(1))
            .expect("hour truncation is always representable")
    }

    /// The store key for the hour bucket containing `ts`.
    pub fn slot_key(ts: DateTime<Utc>) -> String {
        format!("{}{}", HISTORY_KEY_PREFIX, Self::bucket_of(ts).format(KEY_TIME_FORMAT))
    }

    /// The store keys for the last `hours` buckets, walking backward from
    /// the bucket containing `now`.
    pub fn key_range(now: DateTime<Utc>, hours: u32) -> Vec<String> {
        let bucket = Self::bucket_of(now);
        (0..hours).map(|i| Self::slot_key(bucket - TimeDelta::hours(i64::from(i)))).collect()
    }

    /// Parses a store key back into its bucket timestamp.
    pub fn key_to_time(key: &str) -> Option<DateTime<Utc>> {
        let timestr = key.strip_prefix(HISTORY_KEY_PREFIX)?;
        let (date, hour) = timestr.split_once('_')?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let hour: u32 = hour.parse().ok()?;
        Some(date.and_hms_opt(hour, 0, 0)?.and_utc())
    }
}

impl std::fmt::Display for HistorySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key {} next flush {:?} {}", self.key(), self.next_flush, self.checks)
    }
}
