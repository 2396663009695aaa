//! Pure rule evaluation turning one weather observation (and optionally a
//! forecast) into alerts.
//!
//! Evaluation is side-effect free and total: absent weather yields an empty
//! list, and no rule can fail for well-formed input. All thresholds and
//! category toggles come from the user's [`AlertSettings`].

use crate::models::{Alert, AlertSettings, AlertSeverity, AlertType, Forecast, WeatherSnapshot};

/// How many forecast entries are inspected for upcoming severe weather.
const FORECAST_SCAN_LIMIT: usize = 24;

/// Humidity floor for the heavy-rain rule, in percent.
const HEAVY_RAIN_HUMIDITY: f64 = 80.0;

/// Evaluates a weather observation against the user's settings.
///
/// Threshold rules fire independently, so one snapshot can produce several
/// alerts. The condition-text rules are an else-if chain: thunderstorm wins
/// over snow, snow over rain. The forecast scan adds at most one alert, for
/// the earliest thunderstorm slot within the scan window.
pub fn evaluate(
    weather: Option<&WeatherSnapshot>,
    forecast: Option<&Forecast>,
    settings: &AlertSettings,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let Some(weather) = weather else {
        return alerts;
    };
    let city = weather.city.as_str();
    let country = weather.country.as_str();

    if let Some(max) = settings.max_temperature {
        if weather.temperature > max {
            alerts.push(Alert::new(
                AlertType::SevereHeat,
                AlertSeverity::High,
                format!("Extreme heat warning: Temperature is {:.1}°C", weather.temperature),
                city,
                country,
            ));
        }
    }

    if let Some(min) = settings.min_temperature {
        if weather.temperature < min {
            alerts.push(Alert::new(
                AlertType::SevereCold,
                AlertSeverity::High,
                format!("Extreme cold warning: Temperature is {:.1}°C", weather.temperature),
                city,
                country,
            ));
        }
    }

    if let Some(max) = settings.max_wind_speed {
        if weather.wind_speed > max {
            alerts.push(Alert::new(
                AlertType::HighWind,
                AlertSeverity::Medium,
                format!("High wind warning: Wind speed is {:.1} m/s", weather.wind_speed),
                city,
                country,
            ));
        }
    }

    if let Some(max) = settings.max_humidity {
        if weather.humidity > max {
            alerts.push(Alert::new(
                AlertType::HighHumidity,
                AlertSeverity::Medium,
                format!("High humidity warning: Humidity is {:.0}%", weather.humidity),
                city,
                country,
            ));
        }
    }

    if let Some(min) = settings.min_humidity {
        if weather.humidity < min {
            alerts.push(Alert::new(
                AlertType::LowHumidity,
                AlertSeverity::Low,
                format!("Low humidity warning: Humidity is {:.0}%", weather.humidity),
                city,
                country,
            ));
        }
    }

    let condition = weather.condition.to_lowercase();
    if condition.contains("thunderstorm") && settings.enable_thunderstorm_alerts {
        alerts.push(Alert::new(
            AlertType::Thunderstorm,
            AlertSeverity::High,
            "Thunderstorm warning: Severe weather conditions expected",
            city,
            country,
        ));
    } else if condition.contains("snow")
        && weather.temperature < 0.0
        && settings.enable_heavy_snow_alerts
    {
        alerts.push(Alert::new(
            AlertType::HeavySnow,
            AlertSeverity::Medium,
            "Heavy snow warning: Snow conditions expected",
            city,
            country,
        ));
    } else if condition.contains("rain")
        && weather.humidity > HEAVY_RAIN_HUMIDITY
        && settings.enable_heavy_rain_alerts
    {
        alerts.push(Alert::new(
            AlertType::HeavyRain,
            AlertSeverity::Medium,
            "Heavy rain warning: High precipitation expected",
            city,
            country,
        ));
    }

    if let Some(forecast) = forecast {
        if settings.enable_thunderstorm_alerts {
            for entry in forecast.entries.iter().take(FORECAST_SCAN_LIMIT) {
                if entry.condition.to_lowercase().contains("thunderstorm") {
                    alerts.push(Alert::new(
                        AlertType::Thunderstorm,
                        AlertSeverity::High,
                        format!(
                            "Thunderstorm expected at {}",
                            entry.timestamp.format("%Y-%m-%d %H:%M")
                        ),
                        city,
                        country,
                    ));
                    break;
                }
            }
        }
    }

    alerts
}
