//! Recording and scripted notification transports for testing.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    models::{DeliveryRecord, NotificationMessage},
    notification::{EmailTransport, PushTransport, TransportError},
};

/// A push transport that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingPushTransport {
    sent: Mutex<Vec<(String, NotificationMessage)>>,
}

impl RecordingPushTransport {
    /// Creates a new, empty recording transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(user_id, message)` pair sent so far.
    pub fn sent(&self) -> Vec<(String, NotificationMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingPushTransport {
    async fn send_push(
        &self,
        user_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((user_id.to_string(), message.clone()));
        Ok(())
    }
}

/// An email transport that records every delivery and always succeeds.
#[derive(Default)]
pub struct RecordingEmailTransport {
    sent: Mutex<Vec<DeliveryRecord>>,
}

impl RecordingEmailTransport {
    /// Creates a new, empty recording transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery record sent so far.
    pub fn sent(&self) -> Vec<DeliveryRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingEmailTransport {
    async fn send_weather_alert(&self, delivery: &DeliveryRecord) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(delivery.clone());
        Ok(())
    }
}

/// An email transport that fails transiently a scripted number of times
/// before succeeding. `failures_before_success: usize::MAX` never succeeds.
pub struct FailingEmailTransport {
    failures_before_success: usize,
    attempts: AtomicUsize,
    sent: Mutex<Vec<DeliveryRecord>>,
}

impl FailingEmailTransport {
    /// Creates a transport that fails the first `failures_before_success`
    /// attempts.
    pub fn new(failures_before_success: usize) -> Self {
        Self { failures_before_success, attempts: AtomicUsize::new(0), sent: Mutex::new(Vec::new()) }
    }

    /// Total attempts made so far, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Deliveries that made it through.
    pub fn sent(&self) -> Vec<DeliveryRecord> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for FailingEmailTransport {
    async fn send_weather_alert(&self, delivery: &DeliveryRecord) -> Result<(), TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success {
            return Err(TransportError::Transient("simulated connection failure".to_string()));
        }
        self.sent.lock().unwrap().push(delivery.clone());
        Ok(())
    }
}
