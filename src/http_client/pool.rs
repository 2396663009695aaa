//! A reusable, thread-safe pool for managing HTTP clients.
//!
//! This module provides a generic `HttpClientPool` that can be shared across the
//! application to create and reuse HTTP clients with different configurations.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::HttpRetryConfig;

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// A pool for managing and reusing HTTP clients for various services.
///
/// Services that need to make HTTP calls (the weather provider, the email
/// and push transports, the connectivity probe) request a client from the
/// pool, each with a specific `HttpRetryConfig` and an optional per-request
/// timeout. Clients are keyed by that pair so different strategies get
/// different, isolated clients, while repeated requests for the same pair
/// reuse the same client and its connection pool.
pub struct HttpClientPool {
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool`.
    pub fn new() -> Self {
        Self { clients: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Gets an existing HTTP client from the pool or creates a new one if
    /// none exists for the given retry policy and request timeout.
    ///
    /// Uses a double-checked locking pattern to minimize contention: a read
    /// lock for the fast path, and a re-check under the write lock so a
    /// racing task that lost the write race still reuses the winner's client.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
        request_timeout: Option<Duration>,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}/{request_timeout:?}");

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let base_client = builder
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, new_client.clone());

        Ok(new_client)
    }

    /// Returns the number of active HTTP clients in the pool.
    #[cfg(test)]
    pub async fn get_active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_init_empty() {
        let pool = HttpClientPool::new();
        assert_eq!(pool.get_active_client_count().await, 0);
    }

    #[tokio::test]
    async fn test_pool_reuses_client_for_same_config() {
        let pool = HttpClientPool::new();
        let retry_config = HttpRetryConfig::default();

        let client1 = pool.get_or_create(&retry_config, None).await.unwrap();
        let client2 = pool.get_or_create(&retry_config, None).await.unwrap();

        assert!(Arc::ptr_eq(&client1, &client2), "Should return the same client instance");
        assert_eq!(pool.get_active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_isolates_clients_by_config_and_timeout() {
        let pool = HttpClientPool::new();
        let retry_config_1 = HttpRetryConfig::default();
        let retry_config_2 = HttpRetryConfig { max_retries: 5, ..Default::default() };

        let client1 = pool.get_or_create(&retry_config_1, None).await.unwrap();
        let client2 = pool.get_or_create(&retry_config_2, None).await.unwrap();
        let client3 =
            pool.get_or_create(&retry_config_1, Some(Duration::from_secs(30))).await.unwrap();

        assert!(!Arc::ptr_eq(&client1, &client2), "Different retry policy, different client");
        assert!(!Arc::ptr_eq(&client1, &client3), "Different timeout, different client");
        assert_eq!(pool.get_active_client_count().await, 3);

        // Getting the first client again should return the original one
        let client1_again = pool.get_or_create(&retry_config_1, None).await.unwrap();
        assert!(Arc::ptr_eq(&client1, &client1_again));
        assert_eq!(pool.get_active_client_count().await, 3);
    }

    #[tokio::test]
    async fn test_pool_concurrent_access() {
        let pool = Arc::new(HttpClientPool::new());
        let retry_config = HttpRetryConfig::default();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let pool_clone = Arc::clone(&pool);
            let retry_config = retry_config.clone();
            tasks.push(tokio::spawn(async move {
                pool_clone.get_or_create(&retry_config, None).await.unwrap();
            }));
        }

        for result in futures::future::join_all(tasks).await {
            assert!(result.is_ok(), "All tasks should complete successfully");
        }
        assert_eq!(pool.get_active_client_count().await, 1);
    }
}
