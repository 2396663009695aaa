//! Implementation of the AppRepository trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    models::{Alert, AlertSettings, DeliveryRecord, NewDelivery, TrackedCity},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository, traits::AppRepository},
};

/// Column list shared by every query that maps onto a [`DeliveryRecord`].
const DELIVERY_COLUMNS: &str = "delivery_id, user_id, recipient, city, country, message, \
                                alert_type, status, retry_count, last_error, last_attempt_at, \
                                created_at";

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct AlertRow {
    alert: String,
}

impl AlertRow {
    fn into_alert(self) -> Result<Alert, PersistenceError> {
        serde_json::from_str(&self.alert)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))
    }
}

#[async_trait]
impl AppRepository for SqliteStateRepository {
    /// Retrieves all tracked cities for a user, most recently visited first.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_tracked_cities(
        &self,
        user_id: &str,
    ) -> Result<Vec<TrackedCity>, PersistenceError> {
        tracing::debug!(user_id, "Querying for tracked cities.");

        let cities = self
            .execute_query_with_error_handling(
                "query tracked cities",
                sqlx::query_as::<_, TrackedCity>(
                    "SELECT city, country, last_checked_at, check_count FROM tracked_cities \
                     WHERE user_id = ? ORDER BY last_checked_at DESC",
                )
                .bind(user_id)
                .fetch_all(self.pool()),
            )
            .await?;

        tracing::debug!(user_id, city_count = cities.len(), "Tracked cities retrieved.");
        Ok(cities)
    }

    /// Records a visit to a city, creating the tracking row on first visit.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn record_city_visit(
        &self,
        user_id: &str,
        city: &str,
        country: &str,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(user_id, city, country, "Recording city visit.");

        self.execute_query_with_error_handling(
            "record city visit",
            sqlx::query(
                "INSERT INTO tracked_cities (user_id, city, country, last_checked_at, \
                 check_count) VALUES (?, ?, ?, ?, 1) ON CONFLICT(user_id, city, country) DO \
                 UPDATE SET last_checked_at = excluded.last_checked_at, check_count = \
                 check_count + 1",
            )
            .bind(user_id)
            .bind(city)
            .bind(country)
            .bind(Utc::now())
            .execute(self.pool()),
        )
        .await?;

        Ok(())
    }

    /// Stops tracking a city for a user.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn remove_tracked_city(
        &self,
        user_id: &str,
        city: &str,
        country: &str,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(user_id, city, country, "Removing tracked city.");

        self.execute_query_with_error_handling(
            "remove tracked city",
            sqlx::query(
                "DELETE FROM tracked_cities WHERE user_id = ? AND city = ? AND country = ?",
            )
            .bind(user_id)
            .bind(city)
            .bind(country)
            .execute(self.pool()),
        )
        .await?;

        Ok(())
    }

    /// Retrieves the alert settings for a user, falling back to defaults.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alert_settings(&self, user_id: &str) -> Result<AlertSettings, PersistenceError> {
        tracing::debug!(user_id, "Querying for alert settings.");

        let row = self
            .execute_query_with_error_handling(
                "query alert settings",
                sqlx::query_scalar::<_, String>(
                    "SELECT settings FROM alert_settings WHERE user_id = ?",
                )
                .bind(user_id)
                .fetch_optional(self.pool()),
            )
            .await?;

        match row {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| PersistenceError::SerializationError(e.to_string())),
            None => {
                tracing::debug!(user_id, "No saved alert settings, using defaults.");
                Ok(AlertSettings::for_user(user_id))
            }
        }
    }

    /// Saves the alert settings for a user.
    #[tracing::instrument(skip(self, settings), level = "debug")]
    async fn save_alert_settings(
        &self,
        user_id: &str,
        settings: &AlertSettings,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(user_id, "Saving alert settings.");

        let json = serde_json::to_string(settings)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        self.execute_query_with_error_handling(
            "save alert settings",
            sqlx::query(
                "INSERT OR REPLACE INTO alert_settings (user_id, settings) VALUES (?, ?)",
            )
            .bind(user_id)
            .bind(json)
            .execute(self.pool()),
        )
        .await?;

        tracing::info!(user_id, "Alert settings saved successfully.");
        Ok(())
    }

    /// Saves a batch of alerts to the user's history, skipping alerts already
    /// present and trimming the history to its cap.
    #[tracing::instrument(skip(self, alerts), level = "debug")]
    async fn save_alerts(&self, user_id: &str, alerts: &[Alert]) -> Result<u64, PersistenceError> {
        tracing::debug!(user_id, alert_count = alerts.len(), "Saving alerts to history.");

        if alerts.is_empty() {
            return Ok(0);
        }

        // Insert and trim in one transaction so the cap holds at commit
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        let mut inserted = 0u64;
        for alert in alerts {
            let payload = serde_json::to_string(alert)
                .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

            let result = sqlx::query(
                "INSERT OR IGNORE INTO alert_history (user_id, alert_id, created_at, alert) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(alert.id.to_string())
            .bind(alert.created_at)
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

            inserted += result.rows_affected();
        }

        sqlx::query(
            "DELETE FROM alert_history WHERE user_id = ? AND rowid NOT IN (SELECT rowid FROM \
             alert_history WHERE user_id = ? ORDER BY created_at DESC LIMIT ?)",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(i64::from(self.history_cap))
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        tx.commit().await.map_err(|e| PersistenceError::OperationFailed(e.to_string()))?;

        tracing::debug!(user_id, inserted, "Alerts saved to history.");
        Ok(inserted)
    }

    /// Retrieves the user's alert history, newest first.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alert_history(
        &self,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Alert>, PersistenceError> {
        tracing::debug!(user_id, ?limit, "Querying alert history.");

        // A negative LIMIT means unbounded in SQLite
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = self
            .execute_query_with_error_handling(
                "query alert history",
                sqlx::query_as::<_, AlertRow>(
                    "SELECT alert FROM alert_history WHERE user_id = ? ORDER BY created_at DESC \
                     LIMIT ?",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.pool()),
            )
            .await?;

        let alerts =
            rows.into_iter().map(AlertRow::into_alert).collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(user_id, alert_count = alerts.len(), "Alert history retrieved.");
        Ok(alerts)
    }

    /// Removes all alert history for a user.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn clear_alert_history(&self, user_id: &str) -> Result<(), PersistenceError> {
        tracing::debug!(user_id, "Clearing alert history.");

        let result = self
            .execute_query_with_error_handling(
                "clear alert history",
                sqlx::query("DELETE FROM alert_history WHERE user_id = ?")
                    .bind(user_id)
                    .execute(self.pool()),
            )
            .await?;

        let deleted_count = result.rows_affected();
        tracing::info!(user_id, deleted_count, "Alert history cleared successfully.");
        Ok(())
    }

    /// Appends a new delivery to the queue in the pending state.
    #[tracing::instrument(skip(self, delivery), level = "debug")]
    async fn enqueue_delivery(&self, delivery: &NewDelivery) -> Result<i64, PersistenceError> {
        tracing::debug!(
            user_id = %delivery.user_id,
            city = %delivery.city,
            alert_type = %delivery.alert_type,
            "Enqueuing delivery."
        );

        let result = self
            .execute_query_with_error_handling(
                "enqueue delivery",
                sqlx::query(
                    "INSERT INTO deliveries (user_id, recipient, city, country, message, \
                     alert_type, status, retry_count, created_at) VALUES (?, ?, ?, ?, ?, ?, \
                     'pending', 0, ?)",
                )
                .bind(&delivery.user_id)
                .bind(&delivery.recipient)
                .bind(&delivery.city)
                .bind(&delivery.country)
                .bind(&delivery.message)
                .bind(&delivery.alert_type)
                .bind(Utc::now())
                .execute(self.pool()),
            )
            .await?;

        let delivery_id = result.last_insert_rowid();
        tracing::info!(user_id = %delivery.user_id, delivery_id, "Delivery enqueued.");
        Ok(delivery_id)
    }

    /// Retrieves pending deliveries for a user, oldest first.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_pending_deliveries(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeliveryRecord>, PersistenceError> {
        tracing::debug!(user_id, "Querying pending deliveries.");

        let query = format!(
            "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE user_id = ? AND status = 'pending' \
             ORDER BY delivery_id"
        );
        let deliveries = self
            .execute_query_with_error_handling(
                "query pending deliveries",
                sqlx::query_as::<_, DeliveryRecord>(&query)
                    .bind(user_id)
                    .fetch_all(self.pool()),
            )
            .await?;

        tracing::debug!(user_id, count = deliveries.len(), "Pending deliveries retrieved.");
        Ok(deliveries)
    }

    /// Counts deliveries still waiting in the pending state for a user.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_pending_delivery_count(&self, user_id: &str) -> Result<i64, PersistenceError> {
        self.execute_query_with_error_handling(
            "count pending deliveries",
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM deliveries WHERE user_id = ? AND status = 'pending'",
            )
            .bind(user_id)
            .fetch_one(self.pool()),
        )
        .await
    }

    /// Atomically claims a pending delivery for an attempt.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn claim_delivery(
        &self,
        delivery_id: i64,
    ) -> Result<Option<DeliveryRecord>, PersistenceError> {
        tracing::debug!(delivery_id, "Claiming delivery for an attempt.");

        // The status guard makes concurrent claims lose cleanly
        let result = self
            .execute_query_with_error_handling(
                "claim delivery",
                sqlx::query(
                    "UPDATE deliveries SET status = 'sending', retry_count = retry_count + 1, \
                     last_attempt_at = ? WHERE delivery_id = ? AND status = 'pending'",
                )
                .bind(Utc::now())
                .bind(delivery_id)
                .execute(self.pool()),
            )
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(delivery_id, "Delivery no longer pending, claim lost.");
            return Ok(None);
        }

        let query = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE delivery_id = ?");
        let record = self
            .execute_query_with_error_handling(
                "fetch claimed delivery",
                sqlx::query_as::<_, DeliveryRecord>(&query)
                    .bind(delivery_id)
                    .fetch_optional(self.pool()),
            )
            .await?;

        Ok(record)
    }

    /// Removes a delivery after a successful send.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn complete_delivery(&self, delivery_id: i64) -> Result<(), PersistenceError> {
        tracing::debug!(delivery_id, "Completing delivery.");

        let result = self
            .execute_query_with_error_handling(
                "complete delivery",
                sqlx::query("DELETE FROM deliveries WHERE delivery_id = ?")
                    .bind(delivery_id)
                    .execute(self.pool()),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("delivery {delivery_id}")));
        }

        tracing::info!(delivery_id, "Delivery completed and removed.");
        Ok(())
    }

    /// Returns a claimed delivery to the pending state after a transient
    /// failure.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn release_delivery(
        &self,
        delivery_id: i64,
        error: &str,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(delivery_id, error, "Releasing delivery back to pending.");

        let result = self
            .execute_query_with_error_handling(
                "release delivery",
                sqlx::query(
                    "UPDATE deliveries SET status = 'pending', last_error = ? WHERE delivery_id \
                     = ? AND status = 'sending'",
                )
                .bind(error)
                .bind(delivery_id)
                .execute(self.pool()),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("delivery {delivery_id}")));
        }

        Ok(())
    }

    /// Parks a delivery in the failed state with the terminal error recorded.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn mark_delivery_failed(
        &self,
        delivery_id: i64,
        error: &str,
    ) -> Result<(), PersistenceError> {
        tracing::debug!(delivery_id, error, "Marking delivery as failed.");

        let result = self
            .execute_query_with_error_handling(
                "mark delivery failed",
                sqlx::query(
                    "UPDATE deliveries SET status = 'failed', last_error = ? WHERE delivery_id \
                     = ?",
                )
                .bind(error)
                .bind(delivery_id)
                .execute(self.pool()),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("delivery {delivery_id}")));
        }

        tracing::warn!(delivery_id, error, "Delivery parked as failed.");
        Ok(())
    }

    /// Retrieves deliveries parked in the failed state for a user.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_failed_deliveries(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeliveryRecord>, PersistenceError> {
        let query = format!(
            "SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE user_id = ? AND status = 'failed' \
             ORDER BY delivery_id"
        );
        self.execute_query_with_error_handling(
            "query failed deliveries",
            sqlx::query_as::<_, DeliveryRecord>(&query).bind(user_id).fetch_all(self.pool()),
        )
        .await
    }

    /// Returns deliveries stranded in the sending state to pending.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn reset_stuck_deliveries(&self) -> Result<u64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "reset stuck deliveries",
                sqlx::query("UPDATE deliveries SET status = 'pending' WHERE status = 'sending'")
                    .execute(self.pool()),
            )
            .await?;

        let reset_count = result.rows_affected();
        if reset_count > 0 {
            tracing::warn!(reset_count, "Recovered deliveries stranded mid-send.");
        }
        Ok(reset_count)
    }

    /// Performs any necessary cleanup operations before shutdown.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn cleanup(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Performing state repository cleanup.");

        // Force a checkpoint to ensure all WAL data is written to the main
        // database file
        self.checkpoint_wal("TRUNCATE").await?;

        tracing::debug!("State repository cleanup completed.");
        Ok(())
    }

    /// Ensures all pending writes are flushed to disk.
    #[tracing::instrument(skip(self), level = "debug")]
    async fn flush(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Flushing pending writes to disk.");

        // Temporarily set synchronous mode to FULL for maximum durability
        self.set_synchronous_mode("FULL").await?;

        // Force a checkpoint to flush WAL to main database
        self.checkpoint_wal("TRUNCATE").await?;

        // Revert synchronous mode to NORMAL for better performance during
        // normal operations
        self.set_synchronous_mode("NORMAL").await?;

        tracing::debug!("Pending writes flushed successfully.");
        Ok(())
    }
}
