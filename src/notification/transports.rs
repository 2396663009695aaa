//! Push and email transport implementations.
//!
//! Transports do one attempt each; retry and backoff live elsewhere (the
//! HTTP middleware for push, the delivery queue for email). Email failures
//! are classified transient vs. permanent so the queue can decide whether a
//! record is worth another pass.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use url::Url;

use super::error::{NotificationError, TransportError};
use crate::{
    config::{EmailConfig, HttpRetryConfig, PushConfig},
    http_client::HttpClientPool,
    models::{DeliveryRecord, NotificationMessage},
};

/// A channel that can surface a notification on the user's devices.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Delivers one notification. Fire-and-forget from the caller's view;
    /// a failure is logged by the dispatcher, never retried.
    async fn send_push(
        &self,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError>;
}

/// A channel that can deliver one queued weather-alert email.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Makes one delivery attempt for a claimed queue record.
    async fn send_weather_alert(&self, delivery: &DeliveryRecord) -> Result<(), TransportError>;
}

fn classify_response(status: reqwest::StatusCode, body: String) -> TransportError {
    let detail = format!("status {status}: {body}");
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        TransportError::Transient(detail)
    } else {
        TransportError::Permanent(detail)
    }
}

/// The immediate, in-process notification display.
///
/// In a headless deployment there is no screen to draw on, so "display"
/// means a structured log line an operator console can surface. It always
/// succeeds.
pub struct ForegroundPushTransport;

#[async_trait]
impl PushTransport for ForegroundPushTransport {
    async fn send_push(
        &self,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError> {
        tracing::info!(user_id, title = %message.title, body = %message.body, "Weather alert");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest<'a> {
    user_id: &'a str,
    title: &'a str,
    body: &'a str,
}

/// Server-mediated push delivery, so alerts still reach the user's devices
/// when no client is in the foreground.
pub struct HttpPushTransport {
    client: Arc<ClientWithMiddleware>,
    endpoint: Url,
}

impl HttpPushTransport {
    /// Creates a push transport from its configuration, drawing a retryable
    /// client from the shared pool.
    pub async fn new(
        config: &PushConfig,
        retry_policy: &HttpRetryConfig,
        pool: &HttpClientPool,
    ) -> Result<Self, NotificationError> {
        let client = pool.get_or_create(retry_policy, None).await?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    #[tracing::instrument(skip(self, message), level = "debug")]
    async fn send_push(
        &self,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError> {
        let request =
            PushRequest { user_id, title: &message.title, body: &message.body };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_response(status, body))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest<'a> {
    to_email: &'a str,
    city: &'a str,
    country: &'a str,
    alert_message: &'a str,
    alert_type: &'a str,
}

/// Email delivery through the notification API endpoint.
///
/// Deliberately built without middleware retries: one call is one attempt,
/// and the delivery queue owns the retry state machine.
pub struct HttpEmailTransport {
    client: Arc<ClientWithMiddleware>,
    endpoint: Url,
}

impl HttpEmailTransport {
    /// Creates an email transport from its configuration. The client carries
    /// the configured request timeout and no retry middleware.
    pub async fn new(
        config: &EmailConfig,
        pool: &HttpClientPool,
    ) -> Result<Self, NotificationError> {
        let no_retries = HttpRetryConfig { max_retries: 0, ..Default::default() };
        let client = pool.get_or_create(&no_retries, Some(config.timeout_secs)).await?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    #[tracing::instrument(skip(self, delivery), fields(delivery_id = delivery.id), level = "debug")]
    async fn send_weather_alert(&self, delivery: &DeliveryRecord) -> Result<(), TransportError> {
        let request = EmailRequest {
            to_email: &delivery.recipient,
            city: &delivery.city,
            country: &delivery.country,
            alert_message: &delivery.message,
            alert_type: &delivery.alert_type,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(delivery_id = delivery.id, "Email accepted by notification API.");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_response(status, body))
    }
}
