//! Data models for notifications.

use serde::{Deserialize, Serialize};

use crate::models::Alert;

/// A message to be sent in a notification, with a title and body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationMessage {
    /// The title of the notification message.
    pub title: String,
    /// The body content of the notification message.
    pub body: String,
}

impl NotificationMessage {
    /// Builds the notification message for an alert.
    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            title: format!("{} Alert - {}", alert.alert_type, alert.city),
            body: alert.message.clone(),
        }
    }
}
