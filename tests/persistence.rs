//! Integration tests for the SQLite state repository.

use cirrus::{
    models::NewDelivery,
    persistence::{SqliteStateRepository, traits::AppRepository},
    test_helpers::AlertBuilder,
};
use tempfile::tempdir;

async fn open(database_url: &str, cap: u32) -> SqliteStateRepository {
    let repo = SqliteStateRepository::new(database_url, cap).await.expect("connect failed");
    repo.run_migrations().await.expect("migrations failed");
    repo
}

#[tokio::test]
async fn alert_history_survives_a_reopen() {
    let dir = tempdir().unwrap();
    let database_url = format!("sqlite:{}", dir.path().join("state.db").display());

    let alert = AlertBuilder::new("Paris", "FR").build();
    {
        let repo = open(&database_url, 100).await;
        assert_eq!(repo.save_alerts("alice", &[alert.clone()]).await.unwrap(), 1);
        repo.flush().await.unwrap();
        repo.close().await;
    }

    let repo = open(&database_url, 100).await;
    let history = repo.get_alert_history("alice", None).await.unwrap();
    assert_eq!(history, vec![alert]);
}

#[tokio::test]
async fn resaving_a_batch_is_idempotent() {
    let repo = open("sqlite::memory:", 100).await;
    let alerts =
        vec![AlertBuilder::new("Paris", "FR").build(), AlertBuilder::new("Tokyo", "JP").build()];

    assert_eq!(repo.save_alerts("alice", &alerts).await.unwrap(), 2);
    assert_eq!(repo.save_alerts("alice", &alerts).await.unwrap(), 0);
    assert_eq!(repo.get_alert_history("alice", None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn history_cap_keeps_only_the_newest_alerts() {
    let repo = open("sqlite::memory:", 5).await;

    let start = chrono::Utc::now();
    for i in 0..8 {
        let alert = AlertBuilder::new("Paris", "FR")
            .message(&format!("alert {i}"))
            .created_at(start + chrono::Duration::seconds(i))
            .build();
        repo.save_alerts("alice", &[alert]).await.unwrap();
    }

    let history = repo.get_alert_history("alice", None).await.unwrap();
    assert_eq!(history.len(), 5);
    // Newest first; the three oldest were trimmed
    assert_eq!(history[0].message, "alert 7");
    assert_eq!(history[4].message, "alert 3");
}

#[tokio::test]
async fn deliveries_survive_a_reopen_and_stuck_ones_recover() {
    let dir = tempdir().unwrap();
    let database_url = format!("sqlite:{}", dir.path().join("state.db").display());

    let delivery = NewDelivery {
        user_id: "alice".to_string(),
        recipient: "alice@example.com".to_string(),
        city: "Paris".to_string(),
        country: "FR".to_string(),
        message: "Extreme heat warning: Temperature is 40.0°C".to_string(),
        alert_type: "SevereHeat".to_string(),
    };

    let id;
    {
        let repo = open(&database_url, 100).await;
        id = repo.enqueue_delivery(&delivery).await.unwrap();
        // Claim but never finish, simulating a crash mid-send
        let claimed = repo.claim_delivery(id).await.unwrap().expect("claim failed");
        assert_eq!(claimed.retry_count, 1);
        repo.close().await;
    }

    let repo = open(&database_url, 100).await;
    assert_eq!(repo.get_pending_delivery_count("alice").await.unwrap(), 0);
    assert_eq!(repo.reset_stuck_deliveries().await.unwrap(), 1);
    assert_eq!(repo.get_pending_delivery_count("alice").await.unwrap(), 1);

    // The recovered record keeps its attempt count
    let recovered = repo.claim_delivery(id).await.unwrap().expect("claim failed");
    assert_eq!(recovered.retry_count, 2);
    assert_eq!(recovered.recipient, "alice@example.com");
}

#[tokio::test]
async fn tracked_city_visits_accumulate_across_reopens() {
    let dir = tempdir().unwrap();
    let database_url = format!("sqlite:{}", dir.path().join("state.db").display());

    {
        let repo = open(&database_url, 100).await;
        repo.record_city_visit("alice", "Paris", "FR").await.unwrap();
        repo.record_city_visit("alice", "Paris", "FR").await.unwrap();
        repo.close().await;
    }

    let repo = open(&database_url, 100).await;
    repo.record_city_visit("alice", "Paris", "FR").await.unwrap();

    let cities = repo.get_tracked_cities("alice").await.unwrap();
    assert_eq!(cities.len(), 1);
    assert_eq!(cities[0].check_count, 3);
}
