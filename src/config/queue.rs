use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

fn default_max_retries() -> i64 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

/// Configuration for the durable delivery queue.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum delivery attempts before a record is parked as failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    /// Delay before a follow-up pass when a pass leaves retriable records
    /// behind, in seconds.
    #[serde(
        default = "default_retry_delay",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub retry_delay_secs: Duration,

    /// Interval between periodic queue passes while online, in seconds.
    #[serde(
        default = "default_check_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub check_interval_secs: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            check_interval_secs: default_check_interval(),
        }
    }
}
