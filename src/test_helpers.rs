//! Shared helpers for unit and integration tests.

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::{
    clock::Clock,
    models::{HealthCheck, HealthSnapshot, Severity},
};

/// Builds a UTC timestamp from its components.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap()
}

/// Builds a snapshot holding a single check.
pub fn snapshot(name: &str, severity: Severity, summary: &str, detail: &[&str]) -> HealthSnapshot {
    HealthSnapshot::single(
        name,
        HealthCheck {
            severity,
            summary: summary.to_string(),
            detail: detail.iter().map(|d| d.to_string()).collect(),
        },
    )
}

/// A [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// The clock's current instant.
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    /// Moves the clock to the given instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    /// Moves the clock forward by the given delta.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        ManualClock::now(self)
    }
}
