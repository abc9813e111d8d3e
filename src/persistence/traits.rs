//! The key/value gateway consumed by the aggregation and report paths.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Serialize, de::DeserializeOwned};

use crate::persistence::error::PersistenceError;

/// A key/value store holding JSON-serialized state objects.
///
/// Point reads and writes operate on whole values; deletion is explicit
/// rather than a null write, and prefix scans return keys only since the
/// callers point-read the values they need.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieves a JSON-serializable state object by its key.
    ///
    /// An absent key is `Ok(None)`; a present but undecodable value is a
    /// [`PersistenceError::SerializationError`].
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError>;

    /// Sets or replaces a JSON-serializable state object by its key.
    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError>;

    /// Removes the value stored under the key. Deleting an absent key is not
    /// an error.
    async fn delete_state(&self, key: &str) -> Result<(), PersistenceError>;

    /// Returns every key that starts with the prefix.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;
}
