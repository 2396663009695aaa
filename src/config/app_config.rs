use std::{collections::HashMap, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{HttpRetryConfig, QueueConfig, deserialize_duration_from_seconds};

/// Provides the default value for shutdown_timeout_secs.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for poll_interval_secs.
fn default_poll_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_history_cap() -> u32 {
    1000
}

fn default_email_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(30)
}

/// Configuration for the upstream weather data provider.
#[derive(Debug, Deserialize, Clone)]
pub struct WeatherProviderConfig {
    /// Base URL of the provider API.
    pub api_url: Url,
    /// API key passed on every request.
    pub api_key: String,
}

/// Configuration for the server-mediated push endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    /// Endpoint that fans a push notification out to the user's devices.
    pub endpoint: Url,
}

/// Configuration for the email transport endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    /// Endpoint that accepts a weather-alert email request.
    pub endpoint: Url,
    /// Request timeout for one transport attempt, in seconds.
    #[serde(
        default = "default_email_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub timeout_secs: Duration,
}

/// Configuration for the connectivity probe that re-arms queue processing.
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectivityConfig {
    /// URL probed to decide whether a network path exists.
    pub probe_url: Url,
    /// Interval between probes, in seconds.
    #[serde(
        default = "default_probe_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub interval_secs: Duration,
}

/// Application configuration for Cirrus.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// The user whose tracked cities this daemon monitors.
    pub user_id: String,

    /// Map of user id to email recipient address. Identity management is
    /// external; this is the resolved projection the daemon works from.
    #[serde(default)]
    pub recipients: HashMap<String, String>,

    /// Weather provider settings.
    pub weather: WeatherProviderConfig,

    /// Email transport settings.
    pub email: EmailConfig,

    /// Optional server-mediated push settings. Absent disables server push.
    #[serde(default)]
    pub push: Option<PushConfig>,

    /// Optional connectivity probe. Absent assumes an always-online host.
    #[serde(default)]
    pub connectivity: Option<ConnectivityConfig>,

    /// Interval between monitoring cycles, in seconds.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub poll_interval_secs: Duration,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub shutdown_timeout: Duration,

    /// Maximum persisted alert-history entries per user.
    #[serde(default = "default_history_cap")]
    pub history_cap: u32,

    /// Delivery queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Configuration for HTTP client retry policies.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("CIRRUS").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            user_id: "test-user".to_string(),
            recipients: HashMap::new(),
            weather: WeatherProviderConfig {
                api_url: Url::parse("http://localhost:9100").unwrap(),
                api_key: "test-key".to_string(),
            },
            email: EmailConfig {
                endpoint: Url::parse("http://localhost:9101/api/notifications/email").unwrap(),
                timeout_secs: default_email_timeout(),
            },
            push: None,
            connectivity: None,
            poll_interval_secs: default_poll_interval(),
            shutdown_timeout: default_shutdown_timeout(),
            history_cap: default_history_cap(),
            queue: QueueConfig::default(),
            http_retry_config: HttpRetryConfig::default(),
        }
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn user_id(mut self, user_id: &str) -> Self {
        self.config.user_id = user_id.to_string();
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn recipient(mut self, user_id: &str, email: &str) -> Self {
        self.config.recipients.insert(user_id.to_string(), email.to_string());
        self
    }

    pub fn weather_api_url(mut self, url: &str) -> Self {
        self.config.weather.api_url = Url::parse(url).unwrap();
        self
    }

    pub fn email_endpoint(mut self, url: &str) -> Self {
        self.config.email.endpoint = Url::parse(url).unwrap();
        self
    }

    pub fn history_cap(mut self, cap: u32) -> Self {
        self.config.history_cap = cap;
        self
    }

    pub fn max_retries(mut self, max_retries: i64) -> Self {
        self.config.queue.max_retries = max_retries;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_builder() {
        let config = AppConfig::builder()
            .user_id("alice")
            .database_url("sqlite::memory:")
            .recipient("alice", "alice@example.com")
            .history_cap(10)
            .max_retries(2)
            .build();

        assert_eq!(config.user_id, "alice");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.recipients.get("alice").unwrap(), "alice@example.com");
        assert_eq!(config.history_cap, 10);
        assert_eq!(config.queue.max_retries, 2);
    }

    #[test]
    fn test_app_config_from_file() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        user_id: "alice"
        weather:
          api_url: "https://api.openweathermap.org"
          api_key: "secret"
        email:
          endpoint: "http://localhost:5009/api/notifications/email/weather-alert"
        recipients:
          alice: "alice@example.com"
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        let app_yaml_path = temp_dir.path().join("app.yaml");
        std::fs::write(&app_yaml_path, config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.weather.api_key, "secret");
        assert_eq!(config.email.timeout_secs, Duration::from_secs(30));
        assert_eq!(config.poll_interval_secs, Duration::from_secs(300));
        assert_eq!(config.history_cap, 1000);
        assert_eq!(config.queue.max_retries, 5);
        assert!(config.push.is_none());
        assert!(config.connectivity.is_none());
    }

    #[test]
    fn test_app_config_with_optional_sections() {
        let config_content = r#"
        database_url: "sqlite:cirrus.db"
        user_id: "bob"
        weather:
          api_url: "https://api.openweathermap.org"
          api_key: "secret"
        email:
          endpoint: "http://localhost:5009/api/notifications/email/weather-alert"
          timeout_secs: 10
        push:
          endpoint: "http://localhost:5009/api/push/send"
        connectivity:
          probe_url: "http://localhost:5009/health"
          interval_secs: 5
        queue:
          max_retries: 3
          retry_delay_secs: 1
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        let app_yaml_path = temp_dir.path().join("app.yaml");
        std::fs::write(&app_yaml_path, config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();
        assert_eq!(config.email.timeout_secs, Duration::from_secs(10));
        assert!(config.push.is_some());
        let connectivity = config.connectivity.unwrap();
        assert_eq!(connectivity.interval_secs, Duration::from_secs(5));
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.queue.retry_delay_secs, Duration::from_secs(1));
    }
}
