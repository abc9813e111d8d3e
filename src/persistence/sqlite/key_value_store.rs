//! Implementation of the KeyValueStore trait for SqliteHealthStore

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;

use crate::persistence::{
    error::PersistenceError, sqlite::SqliteHealthStore, traits::KeyValueStore,
};

#[async_trait]
impl KeyValueStore for SqliteHealthStore {
    /// Retrieves a JSON-serializable state object by its key.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_json_state<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        tracing::debug!(key, "Attempting to retrieve JSON state.");

        let result = self
            .execute_query_with_error_handling(
                "get JSON state",
                sqlx::query("SELECT value FROM health_state WHERE key = ?")
                    .bind(key)
                    .fetch_optional(self.pool()),
            )
            .await?;

        match result {
            Some(row) => {
                let value_str: String = row
                    .try_get("value")
                    .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;
                serde_json::from_str(&value_str)
                    .map(Some)
                    .map_err(|e| PersistenceError::SerializationError(e.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Sets or updates a JSON-serializable state object by its key.
    #[tracing::instrument(skip(self, value), level = "debug")]
    async fn set_json_state<T: Serialize + Send + Sync + 'static>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(key, "Attempting to set JSON state.");

        let value_str = serde_json::to_string(value)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        self.execute_query_with_error_handling(
            "set JSON state",
            sqlx::query("INSERT OR REPLACE INTO health_state (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value_str)
                .execute(self.pool()),
        )
        .await?;

        Ok(())
    }

    /// Removes the value stored under the key.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn delete_state(&self, key: &str) -> Result<(), PersistenceError> {
        tracing::debug!(key, "Attempting to delete state.");

        self.execute_query_with_error_handling(
            "delete state",
            sqlx::query("DELETE FROM health_state WHERE key = ?")
                .bind(key)
                .execute(self.pool()),
        )
        .await?;

        Ok(())
    }

    /// Returns every key that starts with the prefix.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        tracing::debug!(prefix, "Attempting to list keys by prefix.");

        // LIKE treats % and _ as wildcards, and bucket keys contain _ between
        // date and hour, so escape the prefix before appending the wildcard.
        let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let like_prefix = format!("{}%", escaped);
        let rows = self
            .execute_query_with_error_handling(
                "list keys by prefix",
                sqlx::query("SELECT key FROM health_state WHERE key LIKE ? ESCAPE '\\'")
                    .bind(like_prefix)
                    .fetch_all(self.pool()),
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                row.try_get("key")
                    .map_err(|e| PersistenceError::OperationFailed(e.to_string()))
            })
            .collect()
    }
}
