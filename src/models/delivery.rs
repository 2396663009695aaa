//! Durable email delivery records and their lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queued delivery.
///
/// A record starts `Pending`, moves to `Sending` while an attempt is in
/// flight, and either disappears on transport success (deletion is the
/// implicit "sent" state), returns to `Pending` for another attempt, or
/// parks in `Failed` permanently once retries are exhausted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Eligible for the next processing pass.
    Pending,
    /// An attempt is currently in flight; skipped by concurrent passes.
    Sending,
    /// Terminal. Retained for diagnostics, never retried automatically.
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sending => write!(f, "sending"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A durable unit of pending email-notification work.
///
/// Survives process restarts; the queue guarantees at-least-once delivery
/// while a network path exists, bounded by the configured retry limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct DeliveryRecord {
    /// Auto-assigned sequence id.
    #[sqlx(rename = "delivery_id")]
    pub id: i64,
    /// The user whose alert produced this delivery.
    pub user_id: String,
    /// Destination email address.
    pub recipient: String,
    /// City the alert applies to.
    pub city: String,
    /// Country of the city.
    pub country: String,
    /// Alert message body.
    pub message: String,
    /// Alert category name, e.g. "SevereHeat".
    pub alert_type: String,
    /// Current lifecycle state.
    pub status: DeliveryStatus,
    /// Number of attempts made so far.
    pub retry_count: i64,
    /// Error text from the most recent failed attempt, if any.
    pub last_error: Option<String>,
    /// When the most recent attempt started, if any.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the record was enqueued.
    pub created_at: DateTime<Utc>,
}

/// The fields a caller provides when enqueuing a delivery; everything else
/// is assigned by the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDelivery {
    /// The user whose alert produced this delivery.
    pub user_id: String,
    /// Destination email address.
    pub recipient: String,
    /// City the alert applies to.
    pub city: String,
    /// Country of the city.
    pub country: String,
    /// Alert message body.
    pub message: String,
    /// Alert category name.
    pub alert_type: String,
}
