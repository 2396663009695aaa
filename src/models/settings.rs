//! Per-user alert settings.

use serde::{Deserialize, Serialize};

/// Default maximum temperature threshold in degrees Celsius.
fn default_max_temperature() -> Option<f64> {
    Some(35.0)
}

/// Default minimum temperature threshold in degrees Celsius.
fn default_min_temperature() -> Option<f64> {
    Some(-10.0)
}

/// Default maximum wind speed threshold in meters per second.
fn default_max_wind_speed() -> Option<f64> {
    Some(20.0)
}

fn default_true() -> bool {
    true
}

/// Per-user configuration controlling which alerts fire and which channels
/// deliver them.
///
/// Numeric thresholds are optional; `None` means "no threshold configured"
/// and the corresponding rule never fires. Category and channel toggles are
/// plain booleans. `monitored_cities` restricts the monitoring cycle to an
/// explicit subset of tracked cities; an empty list monitors all of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertSettings {
    /// The user these settings belong to.
    pub user_id: String,
    /// Temperatures above this fire a severe-heat alert.
    #[serde(default = "default_max_temperature")]
    pub max_temperature: Option<f64>,
    /// Temperatures below this fire a severe-cold alert.
    #[serde(default = "default_min_temperature")]
    pub min_temperature: Option<f64>,
    /// Wind speeds above this fire a high-wind alert.
    #[serde(default = "default_max_wind_speed")]
    pub max_wind_speed: Option<f64>,
    /// Humidity below this fires a low-humidity alert. No default.
    #[serde(default)]
    pub min_humidity: Option<f64>,
    /// Humidity above this fires a high-humidity alert. No default.
    #[serde(default)]
    pub max_humidity: Option<f64>,
    /// Whether thunderstorm alerts are evaluated.
    #[serde(default = "default_true")]
    pub enable_thunderstorm_alerts: bool,
    /// Whether heavy-rain alerts are evaluated.
    #[serde(default = "default_true")]
    pub enable_heavy_rain_alerts: bool,
    /// Whether heavy-snow alerts are evaluated.
    #[serde(default = "default_true")]
    pub enable_heavy_snow_alerts: bool,
    /// Whether push notifications are dispatched for the priority city.
    #[serde(default)]
    pub enable_push_notifications: bool,
    /// Whether email notifications are queued for the priority city.
    #[serde(default)]
    pub enable_email_notifications: bool,
    /// Explicit "City, Country" labels to monitor. Empty monitors every
    /// tracked city.
    #[serde(default)]
    pub monitored_cities: Vec<String>,
}

impl AlertSettings {
    /// Returns the default settings for a user.
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            max_temperature: default_max_temperature(),
            min_temperature: default_min_temperature(),
            max_wind_speed: default_max_wind_speed(),
            min_humidity: None,
            max_humidity: None,
            enable_thunderstorm_alerts: true,
            enable_heavy_rain_alerts: true,
            enable_heavy_snow_alerts: true,
            enable_push_notifications: false,
            enable_email_notifications: false,
            monitored_cities: Vec::new(),
        }
    }
}
