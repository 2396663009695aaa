//! Integration tests for the delivery queue worker against a real SQLite
//! repository.

use std::{sync::Arc, time::Duration};

use cirrus::{
    config::QueueConfig,
    delivery::DeliveryQueue,
    models::{DeliveryStatus, NewDelivery},
    persistence::{SqliteStateRepository, traits::AppRepository},
    test_helpers::FailingEmailTransport,
};
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

async fn repository() -> Arc<SqliteStateRepository> {
    let repo =
        SqliteStateRepository::new("sqlite::memory:", 100).await.expect("connect failed");
    repo.run_migrations().await.expect("migrations failed");
    Arc::new(repo)
}

fn delivery_for(user_id: &str) -> NewDelivery {
    NewDelivery {
        user_id: user_id.to_string(),
        recipient: "alice@example.com".to_string(),
        city: "Paris".to_string(),
        country: "FR".to_string(),
        message: "Extreme heat warning: Temperature is 40.0°C".to_string(),
        alert_type: "SevereHeat".to_string(),
    }
}

struct QueueHarness {
    signal: Arc<Notify>,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
    _connectivity: watch::Sender<bool>,
}

fn spawn_queue(
    repo: Arc<SqliteStateRepository>,
    transport: Arc<FailingEmailTransport>,
    user_id: &str,
) -> QueueHarness {
    let config = QueueConfig {
        max_retries: 5,
        retry_delay_secs: Duration::ZERO,
        check_interval_secs: Duration::from_secs(3600),
    };
    let signal = Arc::new(Notify::new());
    let token = CancellationToken::new();
    let (connectivity_tx, connectivity_rx) = watch::channel(true);

    let queue = DeliveryQueue::new(
        repo,
        transport,
        user_id.to_string(),
        config,
        Arc::clone(&signal),
        connectivity_rx,
        token.clone(),
    );
    let handle = tokio::spawn(queue.run());
    QueueHarness { signal, token, handle, _connectivity: connectivity_tx }
}

/// Polls until `predicate` returns true or a couple of seconds pass.
async fn wait_for<F, Fut>(mut predicate: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if predicate().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn delivery_succeeds_after_transient_failures() {
    let repo = repository().await;
    let transport = Arc::new(FailingEmailTransport::new(2));
    repo.enqueue_delivery(&delivery_for("alice")).await.unwrap();

    let harness = spawn_queue(Arc::clone(&repo), Arc::clone(&transport), "alice");
    harness.signal.notify_one();

    wait_for(|| {
        let transport = Arc::clone(&transport);
        async move { !transport.sent().is_empty() }
    })
    .await;

    // Two failed attempts, then success; success removes the record
    assert_eq!(transport.attempts(), 3);
    wait_for(|| {
        let repo = Arc::clone(&repo);
        async move { repo.get_pending_delivery_count("alice").await.unwrap() == 0 }
    })
    .await;
    assert!(repo.get_failed_deliveries("alice").await.unwrap().is_empty());

    harness.token.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn delivery_parks_failed_after_retries_are_exhausted() {
    let repo = repository().await;
    let transport = Arc::new(FailingEmailTransport::new(usize::MAX));
    repo.enqueue_delivery(&delivery_for("alice")).await.unwrap();

    let harness = spawn_queue(Arc::clone(&repo), Arc::clone(&transport), "alice");
    harness.signal.notify_one();

    wait_for(|| {
        let repo = Arc::clone(&repo);
        async move { !repo.get_failed_deliveries("alice").await.unwrap().is_empty() }
    })
    .await;

    let failed = repo.get_failed_deliveries("alice").await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, DeliveryStatus::Failed);
    assert_eq!(failed[0].retry_count, 5);
    assert!(failed[0].last_error.is_some());
    assert_eq!(transport.attempts(), 5);
    assert_eq!(repo.get_pending_delivery_count("alice").await.unwrap(), 0);

    // A later pass must not touch the parked record
    harness.signal.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.attempts(), 5);

    harness.token.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn queue_drains_multiple_deliveries_in_one_pass() {
    let repo = repository().await;
    let transport = Arc::new(FailingEmailTransport::new(0));
    for _ in 0..3 {
        repo.enqueue_delivery(&delivery_for("alice")).await.unwrap();
    }

    let harness = spawn_queue(Arc::clone(&repo), Arc::clone(&transport), "alice");
    harness.signal.notify_one();

    wait_for(|| {
        let transport = Arc::clone(&transport);
        async move { transport.sent().len() == 3 }
    })
    .await;
    assert_eq!(repo.get_pending_delivery_count("alice").await.unwrap(), 0);

    harness.token.cancel();
    harness.handle.await.unwrap();
}
