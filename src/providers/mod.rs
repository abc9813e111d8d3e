//! External data providers: the live health snapshot and crash history.

pub mod crash;
pub mod file;
pub mod traits;

pub use crash::DirCrashHistory;
pub use file::{FileSnapshotSource, SnapshotWatcher};
