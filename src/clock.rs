//! Wall-clock abstraction.
//!
//! The aggregation core never reads the system time directly; it takes a
//! [`Clock`] so that slot rollover, flush scheduling, and pruning are
//! deterministic under test.

use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

/// A source of the current UTC time.
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
