//! Connectivity probing.
//!
//! Delivery is gated on network reachability: the probe polls a configured
//! URL and publishes online/offline transitions on a watch channel that the
//! delivery queue subscribes to. Hosts without a probe configured run with
//! the channel pinned to online.

use std::{sync::Arc, time::Duration};

use reqwest_middleware::ClientWithMiddleware;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Periodically probes a URL and publishes reachability on a watch channel.
pub struct ConnectivityMonitor {
    client: Arc<ClientWithMiddleware>,
    probe_url: Url,
    interval: Duration,
    sender: watch::Sender<bool>,
    cancellation_token: CancellationToken,
}

impl ConnectivityMonitor {
    /// Creates a new monitor together with the receiver half of its channel.
    ///
    /// The channel starts online so consumers attempt work immediately; the
    /// first failed probe flips it.
    pub fn new(
        client: Arc<ClientWithMiddleware>,
        probe_url: Url,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(true);
        (Self { client, probe_url, interval, sender, cancellation_token }, receiver)
    }

    /// Runs the probe loop until cancelled.
    pub async fn run(self) {
        loop {
            let online = self.probe().await;
            self.sender.send_if_modified(|current| {
                if *current != online {
                    if online {
                        tracing::info!("Connectivity restored.");
                    } else {
                        tracing::warn!(probe_url = %self.probe_url, "Connectivity lost.");
                    }
                    *current = online;
                    true
                } else {
                    false
                }
            });

            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("ConnectivityMonitor cancellation signal received, shutting down...");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("ConnectivityMonitor has shut down.");
    }

    async fn probe(&self) -> bool {
        match self.client.get(self.probe_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(%error, "Connectivity probe request failed.");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::HttpRetryConfig, http_client::HttpClientPool};

    async fn probe_client() -> Arc<ClientWithMiddleware> {
        let pool = HttpClientPool::default();
        let retry = HttpRetryConfig { max_retries: 0, ..Default::default() };
        pool.get_or_create(&retry, Some(Duration::from_secs(2))).await.unwrap()
    }

    fn monitor(client: Arc<ClientWithMiddleware>, url: &str) -> (ConnectivityMonitor, watch::Receiver<bool>) {
        ConnectivityMonitor::new(
            client,
            Url::parse(url).unwrap(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_probe_reports_online_for_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").with_status(204).create_async().await;

        let (monitor, _rx) = monitor(probe_client().await, &server.url());
        assert!(monitor.probe().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_reports_offline_for_server_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(503).create_async().await;

        let (monitor, _rx) = monitor(probe_client().await, &server.url());
        assert!(!monitor.probe().await);
    }

    #[tokio::test]
    async fn test_run_publishes_offline_transition() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(500).expect_at_least(1).create_async().await;

        let client = probe_client().await;
        let token = CancellationToken::new();
        let (sender, mut receiver) = watch::channel(true);
        let monitor = ConnectivityMonitor {
            client,
            probe_url: Url::parse(&server.url()).unwrap(),
            interval: Duration::from_millis(10),
            sender,
            cancellation_token: token.clone(),
        };

        let handle = tokio::spawn(monitor.run());

        receiver.changed().await.unwrap();
        assert!(!*receiver.borrow());

        token.cancel();
        handle.await.unwrap();
    }
}
