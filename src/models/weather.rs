//! Weather observation and forecast data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single current-weather observation for one city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherSnapshot {
    /// The city the observation belongs to.
    pub city: String,
    /// ISO country code or country name, as reported by the provider.
    pub country: String,
    /// Air temperature in degrees Celsius.
    pub temperature: f64,
    /// Perceived temperature in degrees Celsius.
    pub feels_like: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: f64,
    /// Main condition text, e.g. "Clear", "Rain", "Thunderstorm".
    pub condition: String,
    /// Longer human-readable description of the condition.
    pub description: String,
    /// Wind speed in meters per second.
    pub wind_speed: f64,
    /// When the observation was taken.
    pub observed_at: DateTime<Utc>,
}

/// An ordered forecast for one city.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    /// The city the forecast belongs to.
    pub city: String,
    /// Country of the city.
    pub country: String,
    /// Forecast entries in chronological order.
    pub entries: Vec<ForecastEntry>,
}

/// A single forecast time slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastEntry {
    /// Start of the forecast slot.
    pub timestamp: DateTime<Utc>,
    /// Forecast temperature in degrees Celsius.
    pub temperature: f64,
    /// Forecast relative humidity in percent.
    pub humidity: f64,
    /// Main condition text for the slot.
    pub condition: String,
    /// Forecast wind speed in meters per second.
    pub wind_speed: f64,
}
