//! The monitoring orchestrator: decides which cities to evaluate, runs the
//! evaluations, and routes the results.
//!
//! One cycle evaluates the priority city inline, with notifications, and
//! every other tracked city concurrently, history-only. Per-city failures
//! are contained so one unreachable provider or bad city never costs the
//! rest of the cycle.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    engine::evaluator,
    models::{Alert, AlertSettings, TrackedCity},
    notification::NotificationDispatcher,
    persistence::{error::PersistenceError, traits::AppRepository},
    providers::WeatherProvider,
};

/// Fetches one city's data and evaluates it against the settings.
///
/// Provider failures are logged and degrade to "no data": a city whose
/// weather cannot be fetched contributes zero alerts, and a missing forecast
/// just skips the forecast scan.
async fn evaluate_city(
    provider: &dyn WeatherProvider,
    settings: &AlertSettings,
    city: &TrackedCity,
) -> Vec<Alert> {
    let weather = match provider.get_current_weather(&city.city, &city.country).await {
        Ok(weather) => Some(weather),
        Err(error) => {
            tracing::warn!(%error, city = %city.city, "Failed to fetch current weather.");
            None
        }
    };

    let forecast = match provider.get_forecast(&city.city, &city.country).await {
        Ok(forecast) => Some(forecast),
        Err(error) => {
            tracing::warn!(%error, city = %city.city, "Failed to fetch forecast.");
            None
        }
    };

    evaluator::evaluate(weather.as_ref(), forecast.as_ref(), settings)
}

/// Drives monitoring cycles for a user's tracked cities.
pub struct MonitoringOrchestrator {
    repository: Arc<dyn AppRepository>,
    provider: Arc<dyn WeatherProvider>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl MonitoringOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        repository: Arc<dyn AppRepository>,
        provider: Arc<dyn WeatherProvider>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self { repository, provider, dispatcher }
    }

    /// Runs periodic monitoring cycles until cancelled.
    pub async fn run(
        &self,
        user_id: &str,
        poll_interval: Duration,
        cancellation_token: CancellationToken,
    ) {
        loop {
            match self.run_cycle(user_id, None).await {
                Ok(alerts) => {
                    tracing::debug!(user_id, alert_count = alerts.len(), "Cycle completed.");
                }
                Err(error) => {
                    tracing::error!(%error, user_id, "Monitoring cycle failed.");
                }
            }

            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::info!("MonitoringOrchestrator cancellation signal received, shutting down...");
                    break;
                }

                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
        tracing::info!("MonitoringOrchestrator has shut down.");
    }

    /// Runs one monitoring cycle for a user.
    ///
    /// `current_city` names the city the user is looking at right now; when
    /// given it becomes the priority city even if its timestamp would not
    /// win, and an untracked current city is evaluated through a transient
    /// entry that is never persisted. Without it, the most recently visited
    /// tracked city takes priority.
    ///
    /// Returns every alert computed this cycle. Only priority-city alerts
    /// are dispatched to notification channels; all alerts land in history.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn run_cycle(
        &self,
        user_id: &str,
        current_city: Option<(&str, &str)>,
    ) -> Result<Vec<Alert>, PersistenceError> {
        let settings = Arc::new(self.repository.get_alert_settings(user_id).await?);
        let mut tracked = self.repository.get_tracked_cities(user_id).await?;

        if !settings.monitored_cities.is_empty() {
            tracked.retain(|city| settings.monitored_cities.contains(&city.label()));
        }

        let priority = match current_city {
            Some((city, country)) => {
                match tracked.iter().position(|c| c.city == city && c.country == country) {
                    Some(index) => tracked.remove(index),
                    None => TrackedCity::transient(city, country),
                }
            }
            None => {
                let Some(index) = tracked
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, c)| c.last_checked_at)
                    .map(|(index, _)| index)
                else {
                    tracing::debug!(user_id, "No tracked cities to monitor.");
                    return Ok(Vec::new());
                };
                tracked.remove(index)
            }
        };

        tracing::debug!(
            user_id,
            priority_city = %priority.city,
            background_count = tracked.len(),
            "Starting monitoring cycle."
        );

        // Fan the background cities out first so their fetches overlap the
        // priority city's inline work
        let mut background = JoinSet::new();
        for city in tracked {
            let provider = Arc::clone(&self.provider);
            let settings = Arc::clone(&settings);
            background
                .spawn(async move { evaluate_city(provider.as_ref(), &settings, &city).await });
        }

        // Priority city: evaluate, persist, and dispatch inline
        let priority_alerts = evaluate_city(self.provider.as_ref(), &settings, &priority).await;
        if !priority_alerts.is_empty() {
            if let Err(error) = self.repository.save_alerts(user_id, &priority_alerts).await {
                tracing::error!(%error, user_id, "Failed to persist priority-city alerts.");
            }
        }
        self.dispatcher.dispatch_cycle(&priority_alerts, &settings).await;

        // Fan-in barrier: collect every background city's alerts, then write
        // them in a single batch
        let mut background_alerts = Vec::new();
        while let Some(result) = background.join_next().await {
            match result {
                Ok(alerts) => background_alerts.extend(alerts),
                Err(error) => {
                    tracing::error!(%error, user_id, "Background evaluation task panicked.");
                }
            }
        }
        if !background_alerts.is_empty() {
            if let Err(error) = self.repository.save_alerts(user_id, &background_alerts).await {
                tracing::error!(%error, user_id, "Failed to persist background-city alerts.");
            }
        }

        let mut all_alerts = priority_alerts;
        all_alerts.extend(background_alerts);
        tracing::info!(user_id, alert_count = all_alerts.len(), "Monitoring cycle finished.");
        Ok(all_alerts)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        models::{AlertType, WeatherSnapshot},
        notification::{ConfigIdentityResolver, MockPushTransport, PushTransport},
        persistence::traits::MockAppRepository,
        providers::{MockWeatherProvider, ProviderError},
    };

    fn tracked(city: &str, country: &str, hour: u32, minute: u32) -> TrackedCity {
        TrackedCity {
            city: city.to_string(),
            country: country.to_string(),
            last_checked_at: Utc.with_ymd_and_hms(2026, 8, 1, hour, minute, 0).unwrap(),
            check_count: 1,
        }
    }

    fn storm_snapshot(city: &str, country: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            city: city.to_string(),
            country: country.to_string(),
            temperature: 20.0,
            feels_like: 20.0,
            humidity: 70.0,
            pressure: 1008.0,
            condition: "Thunderstorm".to_string(),
            description: "thunderstorm".to_string(),
            wind_speed: 8.0,
            observed_at: Utc::now(),
        }
    }

    fn provider_returning_storms() -> MockWeatherProvider {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_get_current_weather()
            .returning(|city, country| Ok(storm_snapshot(city, country)));
        provider.expect_get_forecast().returning(|_, _| {
            Err(ProviderError::Request("forecast unavailable".to_string()))
        });
        provider
    }

    fn orchestrator(
        repo: MockAppRepository,
        provider: MockWeatherProvider,
        push: MockPushTransport,
    ) -> MonitoringOrchestrator {
        let repo: Arc<dyn AppRepository> = Arc::new(repo);
        let mut recipients = HashMap::new();
        recipients.insert("alice".to_string(), "alice@example.com".to_string());

        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&repo),
            Arc::new(ConfigIdentityResolver::new(recipients)),
            Arc::new(push) as Arc<dyn PushTransport>,
            None,
            Arc::new(Notify::new()),
        ));
        MonitoringOrchestrator::new(repo, Arc::new(provider), dispatcher)
    }

    fn notification_settings() -> AlertSettings {
        let mut settings = AlertSettings::for_user("alice");
        settings.enable_push_notifications = true;
        settings.enable_email_notifications = true;
        settings
    }

    #[tokio::test]
    async fn test_empty_tracked_set_is_a_noop() {
        let mut repo = MockAppRepository::new();
        repo.expect_get_alert_settings()
            .returning(|user| Ok(AlertSettings::for_user(user)));
        repo.expect_get_tracked_cities().returning(|_| Ok(vec![]));
        repo.expect_save_alerts().never();

        let mut provider = MockWeatherProvider::new();
        provider.expect_get_current_weather().never();

        let orchestrator = orchestrator(repo, provider, MockPushTransport::new());
        let alerts = orchestrator.run_cycle("alice", None).await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_most_recent_city_gets_notifications_all_get_history() {
        // Paris visited 10:00, Tokyo 10:05: Tokyo is the priority city
        let mut repo = MockAppRepository::new();
        repo.expect_get_alert_settings().returning(|_| Ok(notification_settings()));
        repo.expect_get_tracked_cities()
            .returning(|_| Ok(vec![tracked("Tokyo", "JP", 10, 5), tracked("Paris", "FR", 10, 0)]));
        // One batch for the priority city, one for the background set
        repo.expect_save_alerts().times(2).returning(|_, alerts| Ok(alerts.len() as u64));
        repo.expect_enqueue_delivery()
            .withf(|d| d.city == "Tokyo" && d.alert_type == "Thunderstorm")
            .times(1)
            .returning(|_| Ok(1));

        let mut push = MockPushTransport::new();
        push.expect_send_push()
            .withf(|_, message| message.title.contains("Tokyo"))
            .times(1)
            .returning(|_, _| Ok(()));

        let orchestrator = orchestrator(repo, provider_returning_storms(), push);
        let alerts = orchestrator.run_cycle("alice", None).await.unwrap();

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].city, "Tokyo");
        assert!(alerts.iter().all(|a| a.alert_type == AlertType::Thunderstorm));
    }

    #[tokio::test]
    async fn test_explicit_current_city_takes_priority() {
        // Lyon is not tracked; it is synthesized for this cycle only
        let mut repo = MockAppRepository::new();
        repo.expect_get_alert_settings().returning(|_| Ok(notification_settings()));
        repo.expect_get_tracked_cities().returning(|_| Ok(vec![tracked("Paris", "FR", 10, 0)]));
        repo.expect_save_alerts().times(2).returning(|_, alerts| Ok(alerts.len() as u64));
        repo.expect_record_city_visit().never();
        repo.expect_enqueue_delivery()
            .withf(|d| d.city == "Lyon")
            .times(1)
            .returning(|_| Ok(1));

        let mut push = MockPushTransport::new();
        push.expect_send_push()
            .withf(|_, message| message.title.contains("Lyon"))
            .times(1)
            .returning(|_, _| Ok(()));

        let orchestrator = orchestrator(repo, provider_returning_storms(), push);
        let alerts = orchestrator.run_cycle("alice", Some(("Lyon", "FR"))).await.unwrap();

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].city, "Lyon");
    }

    #[tokio::test]
    async fn test_background_city_failure_does_not_abort_cycle() {
        let mut repo = MockAppRepository::new();
        repo.expect_get_alert_settings().returning(|_| Ok(notification_settings()));
        repo.expect_get_tracked_cities()
            .returning(|_| Ok(vec![tracked("Tokyo", "JP", 10, 5), tracked("Paris", "FR", 10, 0)]));
        // Only the priority batch lands; Paris contributes nothing
        repo.expect_save_alerts().times(1).returning(|_, alerts| Ok(alerts.len() as u64));
        repo.expect_enqueue_delivery().times(1).returning(|_| Ok(1));

        let mut provider = MockWeatherProvider::new();
        provider.expect_get_current_weather().returning(|city, country| {
            if city == "Paris" {
                Err(ProviderError::Request("connection reset".to_string()))
            } else {
                Ok(storm_snapshot(city, country))
            }
        });
        provider
            .expect_get_forecast()
            .returning(|_, _| Err(ProviderError::Request("unavailable".to_string())));

        let mut push = MockPushTransport::new();
        push.expect_send_push().times(1).returning(|_, _| Ok(()));

        let orchestrator = orchestrator(repo, provider, push);
        let alerts = orchestrator.run_cycle("alice", None).await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].city, "Tokyo");
    }

    #[tokio::test]
    async fn test_monitored_cities_filter_restricts_the_set() {
        let mut settings = notification_settings();
        settings.monitored_cities = vec!["Paris, FR".to_string()];

        let mut repo = MockAppRepository::new();
        repo.expect_get_alert_settings().returning(move |_| Ok(settings.clone()));
        repo.expect_get_tracked_cities()
            .returning(|_| Ok(vec![tracked("Tokyo", "JP", 10, 5), tracked("Paris", "FR", 10, 0)]));
        repo.expect_save_alerts().times(1).returning(|_, alerts| Ok(alerts.len() as u64));
        repo.expect_enqueue_delivery()
            .withf(|d| d.city == "Paris")
            .times(1)
            .returning(|_| Ok(1));

        let mut provider = MockWeatherProvider::new();
        // Tokyo is filtered out entirely: no fetch for it
        provider
            .expect_get_current_weather()
            .withf(|city, _| city == "Paris")
            .returning(|city, country| Ok(storm_snapshot(city, country)));
        provider
            .expect_get_forecast()
            .returning(|_, _| Err(ProviderError::Request("unavailable".to_string())));

        let mut push = MockPushTransport::new();
        push.expect_send_push().times(1).returning(|_, _| Ok(()));

        let orchestrator = orchestrator(repo, provider, push);
        let alerts = orchestrator.run_cycle("alice", None).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].city, "Paris");
    }
}
