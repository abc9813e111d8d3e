//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    persistence::traits::KeyValueStore,
};

use super::{Supervisor, SupervisorError};

/// A builder for creating a `Supervisor` instance.
pub struct SupervisorBuilder<S: KeyValueStore + 'static> {
    config: Option<AppConfig>,
    store: Option<Arc<S>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<S: KeyValueStore + 'static> Default for SupervisorBuilder<S> {
    fn default() -> Self {
        Self { config: None, store: None, clock: None }
    }
}

impl<S: KeyValueStore + 'static> SupervisorBuilder<S> {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the history store (database connection) for the `Supervisor`.
    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the time source. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    pub fn build(self) -> Result<Supervisor<S>, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let store = self.store.ok_or(SupervisorError::MissingStore)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(Supervisor::new(config, store, clock))
    }
}
