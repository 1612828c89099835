use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::models::{Notification, Toast};
use crate::common::PortalResult;
use crate::store::{fields, Direction, Document, DocumentStore, Query, Snapshot, WriteBatch};

/// Upper bound on writes per batch, matching the hosted backend's limit
const MAX_BATCH_WRITES: usize = 500;

struct Listener {
    user_id: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Live view of the signed-in user's notifications
///
/// Keeps the most recent `window` notifications from a live query, turns
/// fresh arrivals into toasts and applies read/delete operations
/// optimistically.
#[derive(Clone)]
pub struct NotificationCenter {
    store: Arc<dyn DocumentStore>,
    window: usize,
    recency: Duration,
    items: Arc<RwLock<Vec<Notification>>>,
    toasts: broadcast::Sender<Toast>,
    listener: Arc<Mutex<Option<Listener>>>,
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn DocumentStore>, window: usize, recency: Duration) -> Self {
        let (toasts, _) = broadcast::channel(64);
        Self {
            store,
            window,
            recency,
            items: Arc::new(RwLock::new(Vec::new())),
            toasts,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    fn query(&self, user_id: &str) -> Query {
        Query::new("notifications")
            .where_eq("user_id", user_id)
            .order_by("created_at", Direction::Desc)
            .limit(self.window)
    }

    /// Subscribe to `user_id`'s notifications
    ///
    /// The initial result set is loaded before this returns and never
    /// produces toasts.
    pub async fn start(&self, user_id: &str) -> PortalResult<()> {
        self.stop().await;

        let mut subscription = self.store.watch(self.query(user_id)).await?;
        if let Some(initial) = subscription.next().await {
            self.apply(initial).await;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let center = self.clone();
        let uid = user_id.to_string();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    snapshot = subscription.next() => match snapshot {
                        Some(snapshot) => center.apply(snapshot).await,
                        None => break,
                    },
                    _ = shutdown_rx.changed() => break,
                }
            }
            // Dropping the subscription unregisters the live query
            drop(subscription);
            debug!(user_id = %uid, "Notification listener finished");
        });

        info!(
            user_id = %user_id,
            window = self.window,
            "Notification listener started"
        );

        *self.listener.lock().await = Some(Listener {
            user_id: user_id.to_string(),
            shutdown,
            handle,
        });
        Ok(())
    }

    /// Tear down the live query and forget the loaded notifications
    pub async fn stop(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            let _ = listener.shutdown.send(true);
            if let Err(e) = listener.handle.await {
                warn!(user_id = %listener.user_id, error = %e, "Notification listener ended abnormally");
            }
            info!(user_id = %listener.user_id, "Notification listener stopped");
        }
        self.items.write().await.clear();
    }

    pub async fn is_listening(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    pub fn toasts(&self) -> broadcast::Receiver<Toast> {
        self.toasts.subscribe()
    }

    /// Loaded notifications, newest first
    pub async fn notifications(&self) -> Vec<Notification> {
        self.items.read().await.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.items.read().await.iter().filter(|n| !n.read).count()
    }

    async fn apply(&self, snapshot: Snapshot) {
        let items = decode_all(&snapshot.docs);
        *self.items.write().await = items;

        if snapshot.initial {
            return;
        }

        let added = decode_all(snapshot.added());
        if let Some(toast) = toast_for(&added, Utc::now(), self.recency) {
            debug!(toast = %toast.message(), "Surfacing toast");
            // Nobody listening is fine
            let _ = self.toasts.send(toast);
        }
    }

    pub async fn mark_read(&self, notification_id: &str) {
        {
            let mut items = self.items.write().await;
            if let Some(item) = items.iter_mut().find(|n| n.id == notification_id) {
                item.read = true;
            }
        }

        if let Err(e) = self
            .store
            .update("notifications", notification_id, fields(json!({"read": true})))
            .await
        {
            warn!(
                notification_id = %notification_id,
                error = %e,
                "Failed to mark notification as read"
            );
        }
    }

    /// Mark every unread notification of the listening user read
    ///
    /// The loaded window flips locally first. The store is then queried
    /// for all unread notifications, not only the window, and they are
    /// updated in batches of `MAX_BATCH_WRITES`.
    pub async fn mark_all_read(&self) {
        {
            let mut items = self.items.write().await;
            for item in items.iter_mut() {
                item.read = true;
            }
        }

        let user_id = match self.listener.lock().await.as_ref() {
            Some(listener) => listener.user_id.clone(),
            None => return,
        };

        let unread = match self
            .store
            .query(
                &Query::new("notifications")
                    .where_eq("user_id", user_id.as_str())
                    .where_eq("read", false),
            )
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to load unread notifications");
                return;
            }
        };

        if unread.is_empty() {
            return;
        }

        let mut marked = 0;
        for chunk in unread.chunks(MAX_BATCH_WRITES) {
            let mut batch = WriteBatch::new();
            for doc in chunk {
                batch.update("notifications", &doc.id, fields(json!({"read": true})));
            }
            match self.store.commit(batch).await {
                Ok(()) => marked += chunk.len(),
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        count = chunk.len(),
                        error = %e,
                        "Failed to mark notifications as read"
                    );
                    return;
                }
            }
        }

        info!(user_id = %user_id, count = marked, "Marked all notifications as read");
    }

    pub async fn delete(&self, notification_id: &str) {
        self.items
            .write()
            .await
            .retain(|n| n.id != notification_id);

        if let Err(e) = self.store.delete("notifications", notification_id).await {
            warn!(
                notification_id = %notification_id,
                error = %e,
                "Failed to delete notification"
            );
        }
    }
}

fn decode_all<'a>(docs: impl IntoIterator<Item = &'a Document>) -> Vec<Notification> {
    docs.into_iter()
        .filter_map(|doc| match doc.decode::<Notification>() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(notification_id = %doc.id, error = %e, "Skipping malformed notification");
                None
            }
        })
        .collect()
}

/// Decide what to surface for the notifications added in one update
///
/// Only unread items created within `recency` of `now` count. One such item
/// is shown as is; several collapse into a summary.
pub fn toast_for(added: &[Notification], now: DateTime<Utc>, recency: Duration) -> Option<Toast> {
    let recency = chrono::Duration::from_std(recency).unwrap_or_else(|_| chrono::Duration::zero());
    let mut fresh: Vec<&Notification> = added
        .iter()
        .filter(|n| !n.read && now.signed_duration_since(n.created_at) <= recency)
        .collect();

    match fresh.len() {
        0 => None,
        1 => fresh.pop().cloned().map(Toast::Single),
        count => Some(Toast::Summary { count }),
    }
}
