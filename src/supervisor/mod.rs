//! The Supervisor module manages the lifecycle of the Cirrus application.
//!
//! This module implements the **Supervisor Pattern**, a design pattern used to
//! manage the lifecycle of multiple, concurrent, long-running services. It acts
//! as the top-level owner of all major components of the application, such as
//! the monitoring orchestrator, the delivery queue, and the connectivity probe.
//!
//! ## Responsibilities
//!
//! - **Initialization**: The `SupervisorBuilder` constructs and "wires" all
//!   services together, injecting necessary dependencies like configuration and
//!   database connections.
//! - **Lifecycle Management**: The `Supervisor` starts all services and manages
//!   their lifetimes.
//! - **Graceful Shutdown**: It listens for shutdown signals (like Ctrl+C or
//!   SIGTERM) and orchestrates a clean shutdown of all managed services.
//! - **Task Supervision**: It monitors the health of each service. If a
//!   critical service fails (panics or returns an error), the supervisor will
//!   shut down all other services to ensure the application exits cleanly
//!   rather than continuing in a partially-functional state.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, sync::watch};

use crate::{
    config::AppConfig,
    connectivity::ConnectivityMonitor,
    delivery::DeliveryQueue,
    engine::MonitoringOrchestrator,
    http_client::HttpClientPoolError,
    notification::error::NotificationError,
    persistence::{error::PersistenceError, traits::AppRepository},
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A state repository was not provided to the `SupervisorBuilder`.
    #[error("Missing state repository for Supervisor")]
    MissingStateRepository,

    /// A weather provider was not provided to the `SupervisorBuilder`.
    #[error("Missing weather provider for Supervisor")]
    MissingWeatherProvider,

    /// An error occurred while preparing persistent state at startup.
    #[error("Failed to prepare persistent state: {0}")]
    Persistence(#[from] PersistenceError),

    /// An error occurred while constructing a notification transport.
    #[error("Notification transport error: {0}")]
    Notification(#[from] NotificationError),

    /// An error occurred while drawing an HTTP client from the shared pool.
    #[error("HTTP client pool error: {0}")]
    ClientPool(#[from] HttpClientPoolError),
}

/// The primary runtime manager for the application.
///
/// The Supervisor owns all the major components (services) and is responsible
/// for their startup, shutdown, and health monitoring. Once `run` is called,
/// it becomes the main process loop for the entire application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The persistent state repository for managing application state.
    repository: Arc<dyn AppRepository>,

    /// The orchestrator that drives monitoring cycles.
    orchestrator: Arc<MonitoringOrchestrator>,

    /// The delivery queue worker, consumed when the supervisor starts.
    delivery_queue: DeliveryQueue,

    /// The connectivity probe, present only when a probe URL is configured.
    connectivity: Option<ConnectivityMonitor>,

    /// Keeps the always-online channel alive on hosts without a probe.
    _connectivity_anchor: Option<watch::Sender<bool>>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: tokio_util::sync::CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: tokio::task::JoinSet<()>,
}

impl Supervisor {
    /// Starts the supervisor and all its managed services.
    ///
    /// This method is the main entry point for the application's runtime. It
    /// performs the following steps:
    /// 1. Spawns a signal handler to listen for `SIGINT` (Ctrl+C) and
    ///    `SIGTERM`.
    /// 2. Spawns the connectivity probe (when configured), the delivery queue
    ///    worker, and the periodic monitoring loop.
    /// 3. Enters the main `select!` loop, which concurrently listens for the
    ///    shutdown signal and monitors the health of all spawned tasks via
    ///    the `JoinSet`.
    /// 4. Upon shutdown, it waits for all tasks to complete and performs
    ///    graceful cleanup of resources like the database connection.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        // Clone the token for the signal handler task.
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a task to listen for shutdown signals.
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(error) => {
                        tracing::error!(%error, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
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

        // Spawn the connectivity probe when a probe URL is configured.
        if let Some(connectivity) = self.connectivity.take() {
            self.join_set.spawn(async move {
                connectivity.run().await;
            });
        }

        // Spawn the DeliveryQueue worker.
        let delivery_queue = self.delivery_queue;
        self.join_set.spawn(async move {
            delivery_queue.run().await;
        });

        // Spawn the periodic monitoring loop.
        let orchestrator = Arc::clone(&self.orchestrator);
        let user_id = self.config.user_id.clone();
        let poll_interval = self.config.poll_interval_secs;
        let monitor_cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            orchestrator.run(&user_id, poll_interval, monitor_cancellation_token).await;
        });

        // --- Main Supervisor Loop ---
        // This loop is only responsible for monitoring task health and
        // shutdown signals.

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {
                            // Task completed successfully, continue monitoring.
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
                    // Cancellation requested externally, break the loop.
                    break;
                }
            }
        }

        // --- Graceful Shutdown ---

        // Ensure all spawned tasks are properly awaited before cleanup.
        self.join_set.shutdown().await;
        tracing::info!("All supervised tasks have completed.");

        // Perform final cleanup of resources, with a timeout.
        tracing::info!("Starting graceful resource cleanup...");
        let shutdown_timeout = self.config.shutdown_timeout;

        let cleanup_logic = async {
            if let Err(e) = self.repository.flush().await {
                tracing::error!(error = %e, "Failed to flush pending writes, but continuing cleanup.");
            }
            if let Err(e) = self.repository.cleanup().await {
                tracing::error!(error = %e, "Failed to perform state repository cleanup, but continuing.");
            }
            match self.repository.get_pending_delivery_count(&self.config.user_id).await {
                Ok(0) => tracing::info!("Final state: delivery queue is empty."),
                Ok(pending) => tracing::info!(
                    pending_deliveries = pending,
                    "Final state: deliveries remain queued and will resume on next start."
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not retrieve final state during cleanup.")
                }
            }
        };

        if tokio::time::timeout(shutdown_timeout, cleanup_logic).await.is_err() {
            tracing::warn!(
                "Cleanup did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        } else {
            tracing::info!("Cleanup completed successfully.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }

    /// Returns a new `SupervisorBuilder` instance.
    ///
    /// This is the public entry point for creating a supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }
}
