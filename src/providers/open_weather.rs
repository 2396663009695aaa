//! OpenWeather-compatible implementation of the [`WeatherProvider`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use url::Url;

use super::traits::{ProviderError, WeatherProvider};
use crate::{
    config::{HttpRetryConfig, WeatherProviderConfig},
    http_client::HttpClientPool,
    models::{Forecast, ForecastEntry, WeatherSnapshot},
};

const CURRENT_WEATHER_PATH: &str = "data/2.5/weather";
const FORECAST_PATH: &str = "data/2.5/forecast";

// Wire format structs for the provider's JSON responses.

#[derive(Deserialize)]
struct MainDto {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Deserialize)]
struct ConditionDto {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct WindDto {
    speed: f64,
}

#[derive(Deserialize)]
struct SysDto {
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct CurrentWeatherDto {
    name: String,
    #[serde(default)]
    sys: Option<SysDto>,
    main: MainDto,
    weather: Vec<ConditionDto>,
    wind: WindDto,
    dt: i64,
}

#[derive(Deserialize)]
struct ForecastSlotDto {
    dt: i64,
    main: MainDto,
    weather: Vec<ConditionDto>,
    wind: WindDto,
}

#[derive(Deserialize)]
struct ForecastDto {
    list: Vec<ForecastSlotDto>,
}

fn timestamp(dt: i64) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::from_timestamp(dt, 0)
        .ok_or_else(|| ProviderError::Decode(format!("timestamp out of range: {dt}")))
}

fn condition(weather: &[ConditionDto]) -> (String, String) {
    match weather.first() {
        Some(c) => (c.main.clone(), c.description.clone()),
        None => (String::new(), String::new()),
    }
}

/// A weather provider backed by the OpenWeather HTTP API.
///
/// Uses a retryable client from the shared [`HttpClientPool`], so transient
/// upstream hiccups are absorbed by the middleware before they surface here.
pub struct OpenWeatherProvider {
    client: Arc<ClientWithMiddleware>,
    api_url: Url,
    api_key: String,
}

impl OpenWeatherProvider {
    /// Creates a new provider from its configuration, drawing a retryable
    /// client from the shared pool.
    pub async fn new(
        config: &WeatherProviderConfig,
        retry_policy: &HttpRetryConfig,
        pool: &HttpClientPool,
    ) -> Result<Self, ProviderError> {
        let client = pool.get_or_create(retry_policy, None).await?;
        Ok(Self { client, api_url: config.api_url.clone(), api_key: config.api_key.clone() })
    }

    fn request_url(&self, path: &str, city: &str, country: &str) -> Result<Url, ProviderError> {
        let mut url = self.api_url.join(path)?;
        url.query_pairs_mut()
            .append_pair("q", &format!("{city},{country}"))
            .append_pair("units", "metric")
            .append_pair("appid", &self.api_key);
        Ok(url)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        city: &str,
        country: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::CityNotFound(format!("{city}, {country}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        response.json::<T>().await.map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_current_weather(
        &self,
        city: &str,
        country: &str,
    ) -> Result<WeatherSnapshot, ProviderError> {
        let url = self.request_url(CURRENT_WEATHER_PATH, city, country)?;
        let dto: CurrentWeatherDto = self.fetch(url, city, country).await?;

        let (condition, description) = condition(&dto.weather);
        let snapshot = WeatherSnapshot {
            city: dto.name,
            country: dto.sys.map(|s| s.country).unwrap_or_else(|| country.to_string()),
            temperature: dto.main.temp,
            feels_like: dto.main.feels_like,
            humidity: dto.main.humidity,
            pressure: dto.main.pressure,
            condition,
            description,
            wind_speed: dto.wind.speed,
            observed_at: timestamp(dto.dt)?,
        };

        tracing::debug!(
            city = %snapshot.city,
            temperature = snapshot.temperature,
            condition = %snapshot.condition,
            "Fetched current weather."
        );
        Ok(snapshot)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_forecast(&self, city: &str, country: &str) -> Result<Forecast, ProviderError> {
        let url = self.request_url(FORECAST_PATH, city, country)?;
        let dto: ForecastDto = self.fetch(url, city, country).await?;

        let entries = dto
            .list
            .into_iter()
            .map(|slot| {
                let (condition, _) = condition(&slot.weather);
                Ok(ForecastEntry {
                    timestamp: timestamp(slot.dt)?,
                    temperature: slot.main.temp,
                    humidity: slot.main.humidity,
                    condition,
                    wind_speed: slot.wind.speed,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        tracing::debug!(city, entry_count = entries.len(), "Fetched forecast.");
        Ok(Forecast { city: city.to_string(), country: country.to_string(), entries })
    }
}
