//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::{sync::Arc, time::Duration};

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AppConfig, HttpRetryConfig},
    connectivity::ConnectivityMonitor,
    delivery::DeliveryQueue,
    engine::MonitoringOrchestrator,
    http_client::HttpClientPool,
    notification::{
        ConfigIdentityResolver, EmailTransport, ForegroundPushTransport, HttpEmailTransport,
        HttpPushTransport, NotificationDispatcher, PushTransport,
    },
    persistence::traits::AppRepository,
    providers::WeatherProvider,
};

use super::{Supervisor, SupervisorError};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    repository: Option<Arc<dyn AppRepository>>,
    provider: Option<Arc<dyn WeatherProvider>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the state repository (database connection) for the `Supervisor`.
    pub fn repository(mut self, repository: Arc<dyn AppRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Sets the weather provider for the `Supervisor`.
    pub fn provider(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    ///
    /// This method performs the final "wiring" of the application's services:
    /// transports are drawn from a shared HTTP client pool, the dispatcher and
    /// delivery queue are connected through the enqueue signal, and deliveries
    /// left mid-flight by a previous crash are returned to the pending state.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let repository = self.repository.ok_or(SupervisorError::MissingStateRepository)?;
        let provider = self.provider.ok_or(SupervisorError::MissingWeatherProvider)?;

        // Recover deliveries stranded in the sending state by a crash.
        let recovered = repository.reset_stuck_deliveries().await?;
        if recovered > 0 {
            tracing::info!(count = recovered, "Returned stuck deliveries to the pending state.");
        }

        let pool = HttpClientPool::new();
        let cancellation_token = CancellationToken::new();

        // Notification transports. The foreground display is always present;
        // the server-mediated push channel only when an endpoint is configured.
        let local_push: Arc<dyn PushTransport> = Arc::new(ForegroundPushTransport);
        let server_push: Option<Arc<dyn PushTransport>> = match &config.push {
            Some(push_config) => Some(Arc::new(
                HttpPushTransport::new(push_config, &config.http_retry_config, &pool).await?,
            )),
            None => None,
        };
        let email: Arc<dyn EmailTransport> =
            Arc::new(HttpEmailTransport::new(&config.email, &pool).await?);

        let queue_signal = Arc::new(Notify::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&repository),
            Arc::new(ConfigIdentityResolver::new(config.recipients.clone())),
            local_push,
            server_push,
            Arc::clone(&queue_signal),
        ));

        let orchestrator = Arc::new(MonitoringOrchestrator::new(
            Arc::clone(&repository),
            provider,
            dispatcher,
        ));

        // The connectivity channel: probe-driven when configured, otherwise
        // pinned online with the sender parked on the supervisor.
        let (connectivity, connectivity_rx, connectivity_anchor) = match &config.connectivity {
            Some(probe_config) => {
                let probe_retry = HttpRetryConfig { max_retries: 0, ..Default::default() };
                let probe_client =
                    pool.get_or_create(&probe_retry, Some(Duration::from_secs(5))).await?;
                let (monitor, receiver) = ConnectivityMonitor::new(
                    probe_client,
                    probe_config.probe_url.clone(),
                    probe_config.interval_secs,
                    cancellation_token.clone(),
                );
                (Some(monitor), receiver, None)
            }
            None => {
                let (sender, receiver) = watch::channel(true);
                (None, receiver, Some(sender))
            }
        };

        let delivery_queue = DeliveryQueue::new(
            Arc::clone(&repository),
            email,
            config.user_id.clone(),
            config.queue.clone(),
            queue_signal,
            connectivity_rx,
            cancellation_token.clone(),
        );

        Ok(Supervisor {
            config: Arc::new(config),
            repository,
            orchestrator,
            delivery_queue,
            connectivity,
            _connectivity_anchor: connectivity_anchor,
            cancellation_token,
            join_set: tokio::task::JoinSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{persistence::traits::MockAppRepository, providers::MockWeatherProvider};

    fn mock_repository() -> MockAppRepository {
        let mut repository = MockAppRepository::new();
        repository.expect_reset_stuck_deliveries().returning(|| Ok(0));
        repository
    }

    #[tokio::test]
    async fn build_succeeds_with_all_components() {
        let builder = SupervisorBuilder::new()
            .config(AppConfig::default())
            .repository(Arc::new(mock_repository()))
            .provider(Arc::new(MockWeatherProvider::new()));

        let result = builder.build().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn build_fails_if_config_is_missing() {
        let builder = SupervisorBuilder::new()
            .repository(Arc::new(mock_repository()))
            .provider(Arc::new(MockWeatherProvider::new()));

        let result = builder.build().await;
        assert!(matches!(result, Err(SupervisorError::MissingConfig)));
    }

    #[tokio::test]
    async fn build_fails_if_repository_is_missing() {
        let builder = SupervisorBuilder::new()
            .config(AppConfig::default())
            .provider(Arc::new(MockWeatherProvider::new()));

        let result = builder.build().await;
        assert!(matches!(result, Err(SupervisorError::MissingStateRepository)));
    }

    #[tokio::test]
    async fn build_fails_if_provider_is_missing() {
        let builder = SupervisorBuilder::new()
            .config(AppConfig::default())
            .repository(Arc::new(mock_repository()));

        let result = builder.build().await;
        assert!(matches!(result, Err(SupervisorError::MissingWeatherProvider)));
    }

    #[tokio::test]
    async fn build_recovers_stuck_deliveries() {
        let mut repository = MockAppRepository::new();
        repository.expect_reset_stuck_deliveries().times(1).returning(|| Ok(3));

        let builder = SupervisorBuilder::new()
            .config(AppConfig::default())
            .repository(Arc::new(repository))
            .provider(Arc::new(MockWeatherProvider::new()));

        assert!(builder.build().await.is_ok());
    }

    #[tokio::test]
    async fn build_surfaces_startup_persistence_errors() {
        use crate::persistence::error::PersistenceError;

        let mut repository = MockAppRepository::new();
        repository.expect_reset_stuck_deliveries().returning(|| {
            Err(PersistenceError::OperationFailed("pool closed".to_string()))
        });

        let builder = SupervisorBuilder::new()
            .config(AppConfig::default())
            .repository(Arc::new(repository))
            .provider(Arc::new(MockWeatherProvider::new()));

        let result = builder.build().await;
        assert!(matches!(result, Err(SupervisorError::Persistence(_))));
    }
}
