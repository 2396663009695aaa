//! Tracked-city data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A city the monitoring cycle evaluates for a user.
///
/// Membership is the union of a user's favorites and recently searched
/// cities. A row is created on first visit and its counter and timestamp are
/// bumped once per subsequent visit event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct TrackedCity {
    /// City name.
    pub city: String,
    /// Country of the city.
    pub country: String,
    /// The last time the user interacted with this city.
    pub last_checked_at: DateTime<Utc>,
    /// How many times the user has visited or searched this city.
    pub check_count: i64,
}

impl TrackedCity {
    /// Creates a transient tracked city for the current cycle only.
    ///
    /// Used when a caller supplies an explicitly viewed city that is not yet
    /// part of the persisted tracked set. The transient entry is never
    /// written back to storage.
    pub fn transient(city: &str, country: &str) -> Self {
        Self {
            city: city.to_string(),
            country: country.to_string(),
            last_checked_at: Utc::now(),
            check_count: 0,
        }
    }

    /// The "City, Country" label used by settings to name monitored cities.
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}
