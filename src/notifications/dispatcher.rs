use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::NewNotification;
use crate::common::generate_notification_id;
use crate::store::{DocumentStore, WriteBatch};

/// Writes notifications for the flows that trigger them
///
/// Delivery is a background concern: failures are logged and never
/// propagated to the operation that caused the notification.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn DocumentStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Deliver one notification; returns its id when the write succeeded
    pub async fn notify(&self, notification: NewNotification) -> Option<String> {
        let user_id = notification.user_id.clone();
        let kind = notification.kind;
        let data = match notification.into_fields(Utc::now()) {
            Ok(data) => data,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not encode notification");
                return None;
            }
        };

        let id = generate_notification_id();
        match self.store.set("notifications", &id, data, false).await {
            Ok(()) => {
                info!(
                    user_id = %user_id,
                    notification_id = %id,
                    kind = ?kind,
                    "Notification delivered"
                );
                Some(id)
            }
            Err(e) => {
                warn!(user_id = %user_id, kind = ?kind, error = %e, "Notification delivery failed");
                None
            }
        }
    }

    /// Deliver several notifications in one batch; returns how many were
    /// written (all or none)
    pub async fn notify_many(&self, notifications: Vec<NewNotification>) -> usize {
        if notifications.is_empty() {
            return 0;
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for notification in notifications {
            let user_id = notification.user_id.clone();
            match notification.into_fields(now) {
                Ok(data) => {
                    batch.set("notifications", &generate_notification_id(), data, false);
                }
                Err(e) => warn!(user_id = %user_id, error = %e, "Could not encode notification"),
            }
        }

        let count = batch.len();
        match self.store.commit(batch).await {
            Ok(()) => {
                info!(count = count, "Notifications delivered");
                count
            }
            Err(e) => {
                warn!(count = count, error = %e, "Notification batch delivery failed");
                0
            }
        }
    }
}
