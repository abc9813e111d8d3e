//! Lifecycle management for the long-running service.
//!
//! The `Supervisor` owns the background tasks that make up the running
//! service: the aggregation worker, the snapshot watcher, and a signal
//! handler. It starts them, watches their health through a `JoinSet`, and
//! orchestrates a graceful shutdown when a signal arrives or a critical
//! task dies.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    config::AppConfig,
    history::AggregatorService,
    persistence::traits::KeyValueStore,
    providers::{FileSnapshotSource, SnapshotWatcher},
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A history store was not provided to the `SupervisorBuilder`.
    #[error("Missing history store for Supervisor")]
    MissingStore,
}

/// The primary runtime manager for the service.
///
/// Once `run` is called it becomes the main process loop: it spawns all
/// supervised tasks, then only watches for their completion or a shutdown
/// signal.
pub struct Supervisor<S: KeyValueStore + 'static> {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The persistent store for health history records.
    store: Arc<S>,

    /// Injected time source, shared with the aggregation worker.
    clock: Arc<dyn Clock>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: tokio::task::JoinSet<()>,
}

impl<S: KeyValueStore + 'static> Supervisor<S> {
    /// Creates a new Supervisor instance.
    ///
    /// This is typically called by the `SupervisorBuilder` after it has
    /// assembled all the necessary dependencies.
    pub fn new(config: AppConfig, store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            clock,
            cancellation_token: CancellationToken::new(),
            join_set: tokio::task::JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    ///
    /// This is the public entry point for creating a supervisor.
    pub fn builder() -> SupervisorBuilder<S> {
        SupervisorBuilder::new()
    }

    /// The token supervised tasks watch for shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Starts the supervisor and all its managed services.
    ///
    /// Spawns a signal handler for `SIGINT` (Ctrl+C) and `SIGTERM`, the
    /// aggregation worker, and the snapshot watcher, then waits for either a
    /// shutdown signal or a task failure. On shutdown it gives the tasks up
    /// to the configured timeout to drain before aborting them.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        // Clone the token for the signal handler task.
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a task to listen for shutdown signals.
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
            }

            // Notify all other tasks to begin shutting down.
            cancellation_token.cancel();
        });

        // --- Task Spawning ---

        let (aggregator, handle) = AggregatorService::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.cancellation_token.clone(),
        );
        self.join_set.spawn(async move {
            aggregator.run().await;
        });

        let watcher = SnapshotWatcher::new(
            FileSnapshotSource::new(&self.config.snapshot_path),
            handle,
            self.config.poll_interval_ms,
            self.cancellation_token.clone(),
        );
        self.join_set.spawn(async move {
            watcher.run().await;
        });

        // --- Main Supervisor Loop ---

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {
                            // Task completed, continue monitoring the rest.
                        }
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => {
                            // All tasks have completed.
                            break;
                        }
                    }
                }
                _ = self.cancellation_token.cancelled() => {
                    // Cancellation requested, break the loop.
                    break;
                }
            }
        }

        // --- Graceful Shutdown ---

        let shutdown_timeout = self.config.shutdown_timeout;
        let drain = async {
            while self.join_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                "Tasks did not finish within the shutdown timeout of {:?}. Aborting them.",
                shutdown_timeout
            );
            self.join_set.shutdown().await;
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
