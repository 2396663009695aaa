//! This module defines the interface for fetching weather data from an
//! upstream provider.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::{
    http_client::HttpClientPoolError,
    models::{Forecast, WeatherSnapshot},
};

/// Custom error type for weather provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when building the request URL.
    #[error("Failed to build request URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The request could not be sent or no response arrived.
    #[error("Provider request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("Provider returned status {status}: {body}")]
    Status {
        /// HTTP status code of the response.
        status: u16,
        /// Response body, truncated by the caller if oversized.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    /// The provider does not know the requested city.
    #[error("City not found: {0}")]
    CityNotFound(String),

    /// An error occurred while obtaining an HTTP client from the pool.
    #[error("HTTP client pool error: {0}")]
    ClientPool(#[from] HttpClientPoolError),
}

/// A trait for a source of current weather observations and forecasts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetches the current weather observation for a city.
    async fn get_current_weather(
        &self,
        city: &str,
        country: &str,
    ) -> Result<WeatherSnapshot, ProviderError>;

    /// Fetches the hourly forecast for a city, in chronological order.
    async fn get_forecast(&self, city: &str, country: &str) -> Result<Forecast, ProviderError>;
}
