//! Builders for weather and alert fixtures.

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    Alert, AlertSettings, AlertSeverity, AlertType, Forecast, ForecastEntry, WeatherSnapshot,
};

/// Alert settings with defaults and notifications switched on, the shape most
/// dispatch tests want.
pub fn test_settings(user_id: &str) -> AlertSettings {
    let mut settings = AlertSettings::for_user(user_id);
    settings.enable_push_notifications = true;
    settings.enable_email_notifications = true;
    settings
}

/// A builder for creating `WeatherSnapshot` instances for testing.
///
/// Defaults describe a calm, clear day that trips no rule.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: WeatherSnapshot,
}

impl SnapshotBuilder {
    /// Creates a new `SnapshotBuilder` for a city.
    pub fn new(city: &str, country: &str) -> Self {
        Self {
            snapshot: WeatherSnapshot {
                city: city.to_string(),
                country: country.to_string(),
                temperature: 20.0,
                feels_like: 20.0,
                humidity: 50.0,
                pressure: 1013.0,
                condition: "Clear".to_string(),
                description: "clear sky".to_string(),
                wind_speed: 3.0,
                observed_at: Utc::now(),
            },
        }
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.snapshot.temperature = temperature;
        self
    }

    /// Sets the humidity.
    pub fn humidity(mut self, humidity: f64) -> Self {
        self.snapshot.humidity = humidity;
        self
    }

    /// Sets the wind speed.
    pub fn wind_speed(mut self, wind_speed: f64) -> Self {
        self.snapshot.wind_speed = wind_speed;
        self
    }

    /// Sets the main condition text.
    pub fn condition(mut self, condition: &str) -> Self {
        self.snapshot.condition = condition.to_string();
        self
    }

    /// Builds the `WeatherSnapshot` with the provided values.
    pub fn build(self) -> WeatherSnapshot {
        self.snapshot
    }
}

/// A builder for creating `Forecast` instances for testing.
#[derive(Debug, Clone)]
pub struct ForecastBuilder {
    forecast: Forecast,
    start: DateTime<Utc>,
}

impl ForecastBuilder {
    /// Creates a new `ForecastBuilder` for a city, with 3-hour slots
    /// starting one hour from now.
    pub fn new(city: &str, country: &str) -> Self {
        Self {
            forecast: Forecast {
                city: city.to_string(),
                country: country.to_string(),
                entries: Vec::new(),
            },
            start: Utc::now() + Duration::hours(1),
        }
    }

    /// Appends a slot with the given condition.
    pub fn slot(mut self, condition: &str) -> Self {
        let index = self.forecast.entries.len() as i64;
        self.forecast.entries.push(ForecastEntry {
            timestamp: self.start + Duration::hours(3 * index),
            temperature: 18.0,
            humidity: 55.0,
            condition: condition.to_string(),
            wind_speed: 4.0,
        });
        self
    }

    /// Builds the `Forecast` with the provided values.
    pub fn build(self) -> Forecast {
        self.forecast
    }
}

/// A builder for creating `Alert` instances for testing.
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    alert: Alert,
}

impl AlertBuilder {
    /// Creates a new `AlertBuilder` for a city, defaulting to a high-severity
    /// heat alert.
    pub fn new(city: &str, country: &str) -> Self {
        Self {
            alert: Alert::new(
                AlertType::SevereHeat,
                AlertSeverity::High,
                "Extreme heat warning: Temperature is 40.0°C",
                city,
                country,
            ),
        }
    }

    /// Sets the alert type.
    pub fn alert_type(mut self, alert_type: AlertType) -> Self {
        self.alert.alert_type = alert_type;
        self
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: AlertSeverity) -> Self {
        self.alert.severity = severity;
        self
    }

    /// Sets the message.
    pub fn message(mut self, message: &str) -> Self {
        self.alert.message = message.to_string();
        self
    }

    /// Sets the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.alert.created_at = created_at;
        self
    }

    /// Builds the `Alert` with the provided values.
    pub fn build(self) -> Alert {
        self.alert
    }
}
