//! # Notification Service
//!
//! Fans a priority city's alerts out to the configured channels. Push goes
//! out immediately on both transports (in-process display plus the
//! server-mediated endpoint) and is fire-and-forget; email is routed through
//! the durable delivery queue, which owns retries. The dispatcher itself
//! never fails a monitoring cycle: every channel problem is logged and
//! contained here.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashSet;
use tokio::sync::Notify;
use uuid::Uuid;

pub mod error;
mod transports;

pub use error::{NotificationError, TransportError};
#[cfg(test)]
pub use transports::{MockEmailTransport, MockPushTransport};
pub use transports::{
    EmailTransport, ForegroundPushTransport, HttpEmailTransport, HttpPushTransport, PushTransport,
};

use crate::{
    models::{Alert, AlertSettings, NewDelivery, NotificationMessage},
    persistence::traits::AppRepository,
};

/// Maps a user id to the email address notifications go to.
///
/// Identity management lives outside this service; production resolves from
/// the configured recipient map.
pub trait IdentityResolver: Send + Sync {
    /// The email address for a user, if one is known.
    fn email_for(&self, user_id: &str) -> Option<String>;
}

/// An [`IdentityResolver`] backed by the static recipient map in the
/// application configuration.
pub struct ConfigIdentityResolver {
    recipients: HashMap<String, String>,
}

impl ConfigIdentityResolver {
    /// Creates a resolver over the configured user → address map.
    pub fn new(recipients: HashMap<String, String>) -> Self {
        Self { recipients }
    }
}

impl IdentityResolver for ConfigIdentityResolver {
    fn email_for(&self, user_id: &str) -> Option<String> {
        self.recipients.get(user_id).cloned()
    }
}

/// Process-local record of alert ids already dispatched.
///
/// Prevents a second notification for the same alert object when dispatch is
/// invoked twice in one cycle. Grows monotonically for the process lifetime;
/// ids are unique, so it never needs pruning. Passed explicitly rather than
/// kept as ambient static state so tests and multi-user deployments each get
/// their own.
#[derive(Debug, Default)]
pub struct DispatchContext {
    dispatched: DashSet<Uuid>,
}

impl DispatchContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an alert id as dispatched. Returns `true` when this call was
    /// the first to mark it.
    pub fn mark_dispatched(&self, id: Uuid) -> bool {
        self.dispatched.insert(id)
    }

    /// Whether an alert id has already been dispatched.
    pub fn is_dispatched(&self, id: Uuid) -> bool {
        self.dispatched.contains(&id)
    }

    /// Number of alert ids dispatched so far in this process.
    pub fn dispatched_count(&self) -> usize {
        self.dispatched.len()
    }
}

/// Routes a priority city's alerts to push and email channels.
pub struct NotificationDispatcher {
    repository: Arc<dyn AppRepository>,
    identity: Arc<dyn IdentityResolver>,
    local_push: Arc<dyn PushTransport>,
    server_push: Option<Arc<dyn PushTransport>>,
    context: DispatchContext,
    queue_signal: Arc<Notify>,
}

impl NotificationDispatcher {
    /// Creates a new dispatcher.
    ///
    /// `queue_signal` is pinged after every successful enqueue so the
    /// delivery queue worker starts a pass without waiting for its timer.
    pub fn new(
        repository: Arc<dyn AppRepository>,
        identity: Arc<dyn IdentityResolver>,
        local_push: Arc<dyn PushTransport>,
        server_push: Option<Arc<dyn PushTransport>>,
        queue_signal: Arc<Notify>,
    ) -> Self {
        Self {
            repository,
            identity,
            local_push,
            server_push,
            context: DispatchContext::new(),
            queue_signal,
        }
    }

    /// The process-local dispatch bookkeeping, exposed for inspection.
    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    /// Dispatches one cycle's worth of priority-city alerts.
    ///
    /// Push fires once per alert. Email is capped at one per cycle: only the
    /// most recent alert by `created_at` is enqueued, and only if its id has
    /// not been dispatched before. Enqueuing is what marks an alert as
    /// notified; the queue guarantees eventual delivery from there.
    #[tracing::instrument(skip(self, alerts, settings), fields(user_id = %settings.user_id, alert_count = alerts.len()), level = "debug")]
    pub async fn dispatch_cycle(&self, alerts: &[Alert], settings: &AlertSettings) {
        if alerts.is_empty() {
            return;
        }

        if settings.enable_push_notifications {
            for alert in alerts {
                self.send_push(alert, settings).await;
            }
        }

        if settings.enable_email_notifications {
            if let Some(latest) = alerts.iter().max_by_key(|a| a.created_at) {
                self.enqueue_email(latest, settings).await;
            }
        }
    }

    async fn send_push(&self, alert: &Alert, settings: &AlertSettings) {
        let message = NotificationMessage::for_alert(alert);

        if let Err(error) = self.local_push.send_push(&settings.user_id, &message).await {
            tracing::warn!(%error, alert_id = %alert.id, "Local push display failed.");
        }

        // Best effort only; a push that never arrives is acceptable
        if let Some(server_push) = &self.server_push {
            if let Err(error) = server_push.send_push(&settings.user_id, &message).await {
                tracing::warn!(%error, alert_id = %alert.id, "Server push delivery failed.");
            }
        }
    }

    async fn enqueue_email(&self, alert: &Alert, settings: &AlertSettings) {
        let Some(recipient) = self.identity.email_for(&settings.user_id) else {
            tracing::debug!(user_id = %settings.user_id, "No email recipient known, skipping.");
            return;
        };

        if self.context.is_dispatched(alert.id) {
            tracing::debug!(alert_id = %alert.id, "Alert already dispatched, skipping email.");
            return;
        }

        let delivery = NewDelivery {
            user_id: settings.user_id.clone(),
            recipient,
            city: alert.city.clone(),
            country: alert.country.clone(),
            message: alert.message.clone(),
            alert_type: alert.alert_type.to_string(),
        };

        // Mark only once the record is durably queued, so a failed enqueue
        // stays eligible for the next cycle
        match self.repository.enqueue_delivery(&delivery).await {
            Ok(delivery_id) => {
                self.context.mark_dispatched(alert.id);
                tracing::info!(alert_id = %alert.id, delivery_id, "Email queued for delivery.");
                self.queue_signal.notify_one();
            }
            Err(error) => {
                tracing::error!(%error, alert_id = %alert.id, "Failed to enqueue email delivery.");
            }
        }
    }
}
