//! This module contains the data models for the Vigil application.

pub mod accumulator;
pub mod health;
pub mod report;

pub use accumulator::{CheckAccumulator, CheckEntry};
pub use health::{HealthCheck, HealthSnapshot, Severity};
pub use report::{CrashReport, HealthReport, InsightsReport};
