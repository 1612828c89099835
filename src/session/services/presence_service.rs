use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::{fields, DocumentStore};

/// Shortest heartbeat period accepted; zero would make the ticker panic
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

struct Heartbeat {
    user_id: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Writes `online` / `last_seen` to the user record while a session is
/// active
///
/// All presence writes are background writes: failures are logged and
/// swallowed.
#[derive(Clone)]
pub struct PresenceService {
    store: Arc<dyn DocumentStore>,
    interval: Duration,
    heartbeat: Arc<Mutex<Option<Heartbeat>>>,
}

impl PresenceService {
    pub fn new(store: Arc<dyn DocumentStore>, interval: Duration) -> Self {
        if interval < MIN_HEARTBEAT_INTERVAL {
            warn!(
                interval_ms = interval.as_millis() as u64,
                "Heartbeat interval too short, using the minimum"
            );
        }
        Self {
            store,
            interval: interval.max(MIN_HEARTBEAT_INTERVAL),
            heartbeat: Arc::new(Mutex::new(None)),
        }
    }

    /// Mark the user online and start the heartbeat task
    ///
    /// A heartbeat already running (for any user) is stopped first.
    pub async fn start(&self, user_id: &str) {
        let mut heartbeat = self.heartbeat.lock().await;
        if let Some(previous) = heartbeat.take() {
            Self::shutdown(previous).await;
        }

        self.mark_online(user_id).await;

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let service = self.clone();
        let uid = user_id.to_string();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.beat(&uid).await,
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!(user_id = %uid, "Heartbeat task finished");
        });

        info!(
            user_id = %user_id,
            interval_secs = period.as_secs(),
            "Presence heartbeat started"
        );

        *heartbeat = Some(Heartbeat {
            user_id: user_id.to_string(),
            shutdown,
            handle,
        });
    }

    /// Stop the heartbeat task and wait for it to exit
    ///
    /// Once this returns no further heartbeat write happens. Returns the user
    /// the heartbeat was running for.
    pub async fn stop(&self) -> Option<String> {
        let previous = self.heartbeat.lock().await.take()?;
        let user_id = previous.user_id.clone();
        Self::shutdown(previous).await;
        info!(user_id = %user_id, "Presence heartbeat stopped");
        Some(user_id)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn is_running(&self) -> bool {
        self.heartbeat.lock().await.is_some()
    }

    async fn shutdown(heartbeat: Heartbeat) {
        let _ = heartbeat.shutdown.send(true);
        if let Err(e) = heartbeat.handle.await {
            warn!(user_id = %heartbeat.user_id, error = %e, "Heartbeat task ended abnormally");
        }
    }

    async fn beat(&self, user_id: &str) {
        debug!(user_id = %user_id, "Heartbeat");
        self.write(user_id, true).await;
    }

    pub async fn mark_online(&self, user_id: &str) {
        if self.write(user_id, true).await {
            info!(user_id = %user_id, "User marked as online");
        }
    }

    pub async fn mark_offline(&self, user_id: &str) {
        if self.write(user_id, false).await {
            info!(user_id = %user_id, "User marked as offline");
        }
    }

    async fn write(&self, user_id: &str, online: bool) -> bool {
        let data = fields(json!({
            "online": online,
            "last_seen": Utc::now().to_rfc3339(),
        }));
        match self.store.set("users", user_id, data, true).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    online = online,
                    error = %e,
                    "Presence write failed"
                );
                false
            }
        }
    }
}
