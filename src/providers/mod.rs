//! This module defines the interface to upstream weather data services and
//! the OpenWeather-compatible implementation used in production.

mod open_weather;
mod traits;

pub use open_weather::OpenWeatherProvider;
#[cfg(test)]
pub use traits::MockWeatherProvider;
pub use traits::{ProviderError, WeatherProvider};
