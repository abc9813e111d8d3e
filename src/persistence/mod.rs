//! Persistence gateway for the health history store.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteHealthStore;
