#![warn(missing_docs)]
//! Vigil aggregates health events into hourly history buckets and serves
//! consolidated health and crash reports.

pub mod clock;
pub mod config;
pub mod history;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod supervisor;
pub mod test_helpers;
