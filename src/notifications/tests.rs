//! Tests for notifications module
//!
//! These tests verify:
//! - toast selection (recency, read flag, burst collapsing)
//! - the live notification center against the in-memory store
//! - optimistic read/delete operations
//! - batched dispatch

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::store::{fields, DocumentStore, MemoryStore, Query};
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    const RECENCY: Duration = Duration::from_secs(30);

    fn notification(id: &str, read: bool, age_secs: i64) -> Notification {
        Notification {
            id: id.to_string(),
            user_id: "U_ALICE".to_string(),
            kind: NotificationKind::Message,
            title: "New message".to_string(),
            body: "Hi".to_string(),
            link: None,
            read,
            sender: None,
            created_at: Utc::now() - ChronoDuration::seconds(age_secs),
        }
    }

    fn setup(window: usize) -> (Arc<MemoryStore>, NotificationCenter, NotificationDispatcher) {
        let store = Arc::new(MemoryStore::new());
        let center = NotificationCenter::new(store.clone(), window, RECENCY);
        let dispatcher = NotificationDispatcher::new(store.clone());
        (store, center, dispatcher)
    }

    fn message_for(user_id: &str, title: &str) -> NewNotification {
        NewNotification::new(user_id, NotificationKind::Message, title, "")
    }

    // ============================================================================
    // Toast selection
    // ============================================================================

    #[test]
    fn test_toast_for_single_and_summary() {
        let now = Utc::now();

        assert_eq!(toast_for(&[], now, RECENCY), None);

        let one = notification("N_1", false, 2);
        assert_eq!(
            toast_for(&[one.clone()], now, RECENCY),
            Some(Toast::Single(one.clone()))
        );

        let burst = vec![one, notification("N_2", false, 1), notification("N_3", false, 0)];
        assert_eq!(
            toast_for(&burst, now, RECENCY),
            Some(Toast::Summary { count: 3 })
        );
        assert_eq!(Toast::Summary { count: 3 }.message(), "3 new notifications");
    }

    #[test]
    fn test_toast_for_ignores_stale_and_read() {
        let now = Utc::now();
        let added = vec![
            notification("N_OLD", false, 300),
            notification("N_READ", true, 1),
            notification("N_NEW", false, 1),
        ];

        match toast_for(&added, now, RECENCY) {
            Some(Toast::Single(n)) => assert_eq!(n.id, "N_NEW"),
            other => panic!("expected a single toast, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_reads_as_alert() {
        let n: Notification = serde_json::from_value(json!({
            "id": "N_1",
            "user_id": "U_ALICE",
            "type": "carrier-pigeon",
            "created_at": 1714564800000i64
        }))
        .unwrap();
        assert_eq!(n.kind, NotificationKind::Alert);
        assert!(!n.read);
    }

    // ============================================================================
    // Notification center
    // ============================================================================

    #[tokio::test]
    async fn test_initial_snapshot_produces_no_toasts() {
        let (_store, center, dispatcher) = setup(100);
        dispatcher.notify(message_for("U_ALICE", "Earlier")).await.unwrap();

        let mut toasts = center.toasts();
        center.start("U_ALICE").await.unwrap();

        assert_eq!(center.notifications().await.len(), 1);
        assert_eq!(center.unread_count().await, 1);
        assert!(matches!(toasts.try_recv(), Err(TryRecvError::Empty)));

        center.stop().await;
    }

    #[tokio::test]
    async fn test_arrivals_become_toasts() {
        let (_store, center, dispatcher) = setup(100);
        let mut toasts = center.toasts();
        center.start("U_ALICE").await.unwrap();

        dispatcher.notify(message_for("U_ALICE", "Hello")).await.unwrap();
        match toasts.recv().await.unwrap() {
            Toast::Single(n) => assert_eq!(n.title, "Hello"),
            other => panic!("expected a single toast, got {:?}", other),
        }

        let delivered = dispatcher
            .notify_many(vec![
                message_for("U_ALICE", "One"),
                message_for("U_ALICE", "Two"),
                message_for("U_ALICE", "Three"),
                message_for("U_BOB", "Not for Alice"),
            ])
            .await;
        assert_eq!(delivered, 4);
        assert_eq!(toasts.recv().await.unwrap(), Toast::Summary { count: 3 });
        assert_eq!(center.notifications().await.len(), 4);

        center.stop().await;
    }

    #[tokio::test]
    async fn test_stale_arrival_is_not_surfaced() {
        let (store, center, dispatcher) = setup(100);
        let mut toasts = center.toasts();
        center.start("U_ALICE").await.unwrap();

        let stale = Utc::now() - ChronoDuration::minutes(10);
        store
            .set(
                "notifications",
                "N_STALE",
                fields(json!({
                    "user_id": "U_ALICE",
                    "type": "project",
                    "title": "Old news",
                    "read": false,
                    "created_at": stale.to_rfc3339(),
                })),
                false,
            )
            .await
            .unwrap();
        dispatcher.notify(message_for("U_ALICE", "Fresh")).await.unwrap();

        match toasts.recv().await.unwrap() {
            Toast::Single(n) => assert_eq!(n.title, "Fresh"),
            other => panic!("expected the fresh toast only, got {:?}", other),
        }
        center.stop().await;
    }

    #[tokio::test]
    async fn test_window_bounds_loaded_notifications() {
        let (_store, center, dispatcher) = setup(2);
        for title in ["a", "b", "c"] {
            dispatcher.notify(message_for("U_ALICE", title)).await.unwrap();
        }

        center.start("U_ALICE").await.unwrap();
        assert_eq!(center.notifications().await.len(), 2);
        center.stop().await;
    }

    #[tokio::test]
    async fn test_mark_all_read_leaves_no_unread() {
        let (store, center, dispatcher) = setup(100);
        dispatcher
            .notify_many(vec![
                message_for("U_ALICE", "One"),
                message_for("U_ALICE", "Two"),
                message_for("U_BOB", "Bob's"),
            ])
            .await;
        center.start("U_ALICE").await.unwrap();

        center.mark_all_read().await;
        assert_eq!(center.unread_count().await, 0);

        let unread = store
            .query(
                &Query::new("notifications")
                    .where_eq("user_id", "U_ALICE")
                    .where_eq("read", false),
            )
            .await
            .unwrap();
        assert!(unread.is_empty());

        // Other recipients are untouched
        let bobs = store
            .query(&Query::new("notifications").where_eq("user_id", "U_BOB").where_eq("read", false))
            .await
            .unwrap();
        assert_eq!(bobs.len(), 1);

        center.stop().await;
    }

    #[tokio::test]
    async fn test_mark_all_read_reaches_beyond_the_window() {
        let (store, center, dispatcher) = setup(2);
        for title in ["a", "b", "c", "d"] {
            dispatcher.notify(message_for("U_ALICE", title)).await.unwrap();
        }
        center.start("U_ALICE").await.unwrap();
        assert_eq!(center.notifications().await.len(), 2);

        center.mark_all_read().await;

        let unread = store
            .query(
                &Query::new("notifications")
                    .where_eq("user_id", "U_ALICE")
                    .where_eq("read", false),
            )
            .await
            .unwrap();
        assert!(unread.is_empty());
        assert_eq!(center.unread_count().await, 0);

        center.stop().await;
    }

    #[tokio::test]
    async fn test_optimistic_updates_are_not_rolled_back() {
        let (store, center, dispatcher) = setup(100);
        let keep = dispatcher.notify(message_for("U_ALICE", "Keep")).await.unwrap();
        let drop_me = dispatcher.notify(message_for("U_ALICE", "Drop")).await.unwrap();
        center.start("U_ALICE").await.unwrap();

        store.set_offline(true);
        center.mark_read(&keep).await;
        center.delete(&drop_me).await;

        let items = center.notifications().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].read);
        assert_eq!(center.unread_count().await, 0);

        store.set_offline(false);
        let stored = store.get("notifications", &keep).await.unwrap().unwrap();
        assert_eq!(stored.get("read"), Some(&json!(false)));
        assert!(store.get("notifications", &drop_me).await.unwrap().is_some());

        center.stop().await;
    }

    #[tokio::test]
    async fn test_mark_read_and_delete_reach_the_store() {
        let (store, center, dispatcher) = setup(100);
        let id = dispatcher.notify(message_for("U_ALICE", "Hello")).await.unwrap();
        center.start("U_ALICE").await.unwrap();

        center.mark_read(&id).await;
        let stored = store.get("notifications", &id).await.unwrap().unwrap();
        assert_eq!(stored.get("read"), Some(&json!(true)));

        center.delete(&id).await;
        assert!(store.get("notifications", &id).await.unwrap().is_none());

        center.stop().await;
    }

    #[tokio::test]
    async fn test_stop_unregisters_live_query() {
        let (store, center, _dispatcher) = setup(100);
        center.start("U_ALICE").await.unwrap();
        assert_eq!(store.active_watches(), 1);
        assert!(center.is_listening().await);

        // Restarting replaces the subscription instead of stacking one
        center.start("U_ALICE").await.unwrap();
        assert_eq!(store.active_watches(), 1);

        center.stop().await;
        assert_eq!(store.active_watches(), 0);
        assert!(!center.is_listening().await);
        assert!(center.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        let (store, _center, dispatcher) = setup(100);
        store.set_offline(true);

        assert!(dispatcher.notify(message_for("U_ALICE", "Lost")).await.is_none());
        assert_eq!(
            dispatcher
                .notify_many(vec![message_for("U_ALICE", "Lost too")])
                .await,
            0
        );
    }
}
