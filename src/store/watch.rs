use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::models::{diff, ChangeKind, Document, DocumentChange, Query, Snapshot};

/// A registered live query
struct Watcher {
    query: Query,
    last: Vec<Document>,
    sender: mpsc::UnboundedSender<Snapshot>,
}

/// Tracks active live queries and fans result changes out to them
///
/// Stores call `interested` after every committed write to find the
/// watchers whose collection changed, re-run those queries and hand the
/// results to `deliver`. A watcher only receives a snapshot when its result
/// set actually changed.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    // Map of subscription_id -> watcher
    watchers: Arc<Mutex<HashMap<String, Watcher>>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Unregistering happens from `Drop`, so the map sits behind a std mutex;
    // it is never held across an await point.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Watcher>> {
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a live query and deliver its initial snapshot
    pub fn register(&self, query: Query, initial: Vec<Document>) -> Subscription {
        let subscription_id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();

        let snapshot = Snapshot {
            docs: initial.clone(),
            changes: initial
                .iter()
                .map(|doc| DocumentChange {
                    kind: ChangeKind::Added,
                    doc: doc.clone(),
                })
                .collect(),
            initial: true,
        };
        // The receiver is alive, so the initial send cannot fail
        let _ = sender.send(snapshot);

        info!(
            subscription_id = %subscription_id,
            collection = %query.collection,
            "Live query registered"
        );

        self.lock().insert(
            subscription_id.clone(),
            Watcher {
                query,
                last: initial,
                sender,
            },
        );

        Subscription {
            id: subscription_id,
            receiver,
            registry: self.clone(),
        }
    }

    /// Unregister a live query
    pub fn unregister(&self, subscription_id: &str) {
        if self.lock().remove(subscription_id).is_some() {
            info!(subscription_id = %subscription_id, "Live query unregistered");
        }
    }

    /// Watchers whose query reads one of the given collections
    pub fn interested(&self, collections: &BTreeSet<String>) -> Vec<(String, Query)> {
        self.lock()
            .iter()
            .filter(|(_, w)| collections.contains(&w.query.collection))
            .map(|(id, w)| (id.clone(), w.query.clone()))
            .collect()
    }

    /// Hand a fresh result set to a watcher; sends a snapshot if it changed
    pub fn deliver(&self, subscription_id: &str, docs: Vec<Document>) {
        let mut watchers = self.lock();
        let Some(watcher) = watchers.get_mut(subscription_id) else {
            return;
        };

        let changes = diff(&watcher.last, &docs);
        if changes.is_empty() {
            return;
        }

        debug!(
            subscription_id = %subscription_id,
            change_count = changes.len(),
            "Delivering live query snapshot"
        );

        let snapshot = Snapshot {
            docs: docs.clone(),
            changes,
            initial: false,
        };
        watcher.last = docs;

        if watcher.sender.send(snapshot).is_err() {
            // Receiver went away without cancelling
            watchers.remove(subscription_id);
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// Receiving end of a live query
///
/// Dropping the subscription (or calling `cancel`) unregisters it from the
/// store immediately, so no snapshot is delivered after teardown.
pub struct Subscription {
    id: String,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    registry: WatchRegistry,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next snapshot; `None` once the subscription is closed
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Non-blocking poll for an already delivered snapshot
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}
