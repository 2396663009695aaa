//! The durable email delivery queue and its worker loop.
//!
//! Records are claimed with an atomic status compare-and-set, so overlapping
//! passes never double-send. A transport success deletes the record; a
//! transient failure releases it back to pending until its retries are
//! exhausted; a permanent failure parks it as failed on the spot. The worker
//! re-arms on enqueue signals, connectivity restoration, and a periodic
//! timer, and keeps re-passing on its own while retriable records remain.

use std::sync::Arc;

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    config::QueueConfig,
    notification::EmailTransport,
    persistence::{error::PersistenceError, traits::AppRepository},
};

/// What one `process_queue` pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueuePassOutcome {
    /// Records delivered and removed.
    pub sent: u64,
    /// Records that failed transport but stayed eligible for another pass.
    pub retriable: u64,
    /// Records parked permanently in the failed state.
    pub failed: u64,
}

/// Worker that drains pending email deliveries for one user.
pub struct DeliveryQueue {
    repository: Arc<dyn AppRepository>,
    transport: Arc<dyn EmailTransport>,
    user_id: String,
    config: QueueConfig,
    signal: Arc<Notify>,
    connectivity: watch::Receiver<bool>,
    cancellation_token: CancellationToken,
}

impl DeliveryQueue {
    /// Creates a new delivery queue worker.
    ///
    /// `signal` wakes the worker immediately after an enqueue; `connectivity`
    /// carries online/offline transitions from the connectivity probe.
    pub fn new(
        repository: Arc<dyn AppRepository>,
        transport: Arc<dyn EmailTransport>,
        user_id: String,
        config: QueueConfig,
        signal: Arc<Notify>,
        connectivity: watch::Receiver<bool>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { repository, transport, user_id, config, signal, connectivity, cancellation_token }
    }

    /// Starts the long-running worker loop.
    pub async fn run(mut self) {
        loop {
            let periodic_delay = tokio::time::sleep(self.config.check_interval_secs);

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("DeliveryQueue cancellation signal received, shutting down...");
                    break;
                }

                _ = self.signal.notified() => {
                    tracing::debug!("Enqueue signal received, starting queue pass.");
                    self.drain().await;
                }

                result = self.connectivity.changed() => {
                    if result.is_err() {
                        tracing::warn!("Connectivity channel closed, stopping periodic passes.");
                        self.cancellation_token.cancelled().await;
                        break;
                    }
                    if *self.connectivity.borrow() {
                        tracing::info!("Connectivity restored, processing delivery queue.");
                        self.drain().await;
                    }
                }

                _ = periodic_delay => {
                    if self.is_online() {
                        self.drain().await;
                    }
                }
            }
        }
        tracing::info!("DeliveryQueue has shut down.");
    }

    fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }

    /// Repeats queue passes until nothing retriable remains, with a short
    /// delay between passes. Stops early when cancelled or offline.
    async fn drain(&self) {
        loop {
            if !self.is_online() {
                tracing::debug!("Offline, deferring queue pass until connectivity returns.");
                return;
            }

            match self.process_queue().await {
                Ok(outcome) if outcome.retriable > 0 => {
                    tracing::debug!(
                        retriable = outcome.retriable,
                        "Retriable deliveries remain, scheduling another pass."
                    );
                }
                Ok(_) => return,
                Err(error) => {
                    tracing::error!(%error, "Delivery queue pass failed.");
                    return;
                }
            }

            tokio::select! {
                _ = self.cancellation_token.cancelled() => return,
                _ = tokio::time::sleep(self.config.retry_delay_secs) => {}
            }
        }
    }

    /// Makes one delivery attempt for every currently pending record.
    ///
    /// Safe to invoke concurrently with itself: the claim is a status
    /// compare-and-set, so a record already picked up by another pass is
    /// skipped here. A pass over an empty queue is a no-op.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id), level = "debug")]
    pub async fn process_queue(&self) -> Result<QueuePassOutcome, PersistenceError> {
        let pending = self.repository.get_pending_deliveries(&self.user_id).await?;
        if pending.is_empty() {
            return Ok(QueuePassOutcome::default());
        }

        tracing::debug!(count = pending.len(), "Processing pending deliveries.");
        let mut outcome = QueuePassOutcome::default();

        for record in pending {
            let Some(claimed) = self.repository.claim_delivery(record.id).await? else {
                // Lost the claim to a concurrent pass
                continue;
            };

            match self.transport.send_weather_alert(&claimed).await {
                Ok(()) => {
                    self.repository.complete_delivery(claimed.id).await?;
                    tracing::info!(
                        delivery_id = claimed.id,
                        attempts = claimed.retry_count,
                        "Delivery sent."
                    );
                    outcome.sent += 1;
                }
                Err(error) if error.is_transient()
                    && claimed.retry_count < self.config.max_retries =>
                {
                    self.repository.release_delivery(claimed.id, &error.to_string()).await?;
                    tracing::warn!(
                        delivery_id = claimed.id,
                        attempts = claimed.retry_count,
                        %error,
                        "Delivery attempt failed, will retry."
                    );
                    outcome.retriable += 1;
                }
                Err(error) => {
                    self.repository.mark_delivery_failed(claimed.id, &error.to_string()).await?;
                    tracing::error!(
                        delivery_id = claimed.id,
                        attempts = claimed.retry_count,
                        %error,
                        "Delivery failed permanently."
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}
