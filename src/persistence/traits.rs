//! This module contains the state management logic for the Cirrus application.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{Alert, AlertSettings, DeliveryRecord, NewDelivery, TrackedCity},
    persistence::error::PersistenceError,
};

/// Represents the state management interface for the Cirrus application.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppRepository: Send + Sync {
    // Tracked city operations:
    /// Retrieves all tracked cities for a user, most recently visited first.
    async fn get_tracked_cities(&self, user_id: &str)
    -> Result<Vec<TrackedCity>, PersistenceError>;

    /// Records a visit to a city, creating the tracking row on first visit.
    /// One call counts as exactly one visit.
    async fn record_city_visit(
        &self,
        user_id: &str,
        city: &str,
        country: &str,
    ) -> Result<(), PersistenceError>;

    /// Stops tracking a city for a user.
    async fn remove_tracked_city(
        &self,
        user_id: &str,
        city: &str,
        country: &str,
    ) -> Result<(), PersistenceError>;

    // Alert settings operations:
    /// Retrieves the alert settings for a user, falling back to defaults when
    /// the user has never saved any.
    async fn get_alert_settings(&self, user_id: &str) -> Result<AlertSettings, PersistenceError>;

    /// Saves the alert settings for a user.
    async fn save_alert_settings(
        &self,
        user_id: &str,
        settings: &AlertSettings,
    ) -> Result<(), PersistenceError>;

    // Alert history operations:
    /// Saves a batch of alerts to the user's history, skipping alerts already
    /// present and trimming the history to its cap. Returns the number of
    /// newly inserted alerts.
    async fn save_alerts(&self, user_id: &str, alerts: &[Alert]) -> Result<u64, PersistenceError>;

    /// Retrieves the user's alert history, newest first.
    async fn get_alert_history(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Alert>, PersistenceError>;

    /// Removes all alert history for a user.
    async fn clear_alert_history(&self, user_id: &str) -> Result<(), PersistenceError>;

    // Delivery queue operations:
    /// Appends a new delivery to the queue in the pending state. Returns the
    /// assigned delivery id.
    async fn enqueue_delivery(&self, delivery: &NewDelivery) -> Result<i64, PersistenceError>;

    /// Retrieves pending deliveries for a user, oldest first.
    async fn get_pending_deliveries(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeliveryRecord>, PersistenceError>;

    /// Counts deliveries still waiting in the pending state for a user.
    async fn get_pending_delivery_count(&self, user_id: &str) -> Result<i64, PersistenceError>;

    /// Atomically claims a pending delivery for an attempt, moving it to the
    /// sending state and incrementing its retry count. Returns `None` when the
    /// record is no longer pending (already claimed, completed, or removed).
    async fn claim_delivery(
        &self,
        delivery_id: i64,
    ) -> Result<Option<DeliveryRecord>, PersistenceError>;

    /// Removes a delivery after a successful send.
    async fn complete_delivery(&self, delivery_id: i64) -> Result<(), PersistenceError>;

    /// Returns a claimed delivery to the pending state after a transient
    /// failure, keeping its incremented retry count and recording the error.
    async fn release_delivery(&self, delivery_id: i64, error: &str)
    -> Result<(), PersistenceError>;

    /// Parks a delivery in the failed state with the terminal error recorded.
    async fn mark_delivery_failed(
        &self,
        delivery_id: i64,
        error: &str,
    ) -> Result<(), PersistenceError>;

    /// Retrieves deliveries parked in the failed state for a user.
    async fn get_failed_deliveries(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeliveryRecord>, PersistenceError>;

    /// Returns deliveries stranded in the sending state to pending. Used on
    /// startup to recover records claimed by a previous process that never
    /// resolved them.
    async fn reset_stuck_deliveries(&self) -> Result<u64, PersistenceError>;

    /// Performs any necessary cleanup operations before shutdown.
    async fn cleanup(&self) -> Result<(), PersistenceError>;

    /// Ensures all pending writes are flushed to disk.
    async fn flush(&self) -> Result<(), PersistenceError>;
}
