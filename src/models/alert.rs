//! Alert data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The category of condition an alert reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlertType {
    /// Temperature above the configured maximum.
    SevereHeat,
    /// Temperature below the configured minimum.
    SevereCold,
    /// Wind speed above the configured maximum.
    HighWind,
    /// Thunderstorm conditions, current or forecast.
    Thunderstorm,
    /// Rain with very high humidity.
    HeavyRain,
    /// Snow at sub-zero temperatures.
    HeavySnow,
    /// Humidity above the configured maximum.
    HighHumidity,
    /// Humidity below the configured minimum.
    LowHumidity,
    /// Fog conditions.
    Fog,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertType::SevereHeat => "SevereHeat",
            AlertType::SevereCold => "SevereCold",
            AlertType::HighWind => "HighWind",
            AlertType::Thunderstorm => "Thunderstorm",
            AlertType::HeavyRain => "HeavyRain",
            AlertType::HeavySnow => "HeavySnow",
            AlertType::HighHumidity => "HighHumidity",
            AlertType::LowHumidity => "LowHumidity",
            AlertType::Fog => "Fog",
        };
        write!(f, "{}", name)
    }
}

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertSeverity {
    /// Informational.
    Low,
    /// Worth attention.
    Medium,
    /// Potentially dangerous conditions.
    High,
}

/// A single rule violation derived from one weather or forecast evaluation.
///
/// Alerts are value objects produced fresh on every monitoring cycle; the
/// same condition recurring produces a new alert with a new id. Deduplication
/// happens at the notification layer by id within one cycle, never across
/// cycles by content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    /// Opaque unique identifier.
    pub id: Uuid,
    /// The category of the alert.
    pub alert_type: AlertType,
    /// Urgency of the alert.
    pub severity: AlertSeverity,
    /// Human-readable alert message.
    pub message: String,
    /// City the alert applies to.
    pub city: String,
    /// Country of the city.
    pub country: String,
    /// Evaluation wall-clock time, not the observation time.
    pub created_at: DateTime<Utc>,
    /// Whether the user has read the alert.
    #[serde(default)]
    pub read: bool,
}

impl Alert {
    /// Creates a new alert with a fresh id, stamped with the current time.
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        city: &str,
        country: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message: message.into(),
            city: city.to_string(),
            country: country.to_string(),
            created_at: Utc::now(),
            read: false,
        }
    }
}
