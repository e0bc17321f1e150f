//! Scenario tests for the pull pipeline: aggregation, read-state
//! reconciliation, and the selection/batch-delete workflow.
//!
//! These tests verify:
//! 1. The merged feed is deduplicated by `(source, id)` and ordered by
//!    `createdAt` descending, with half-written documents excluded
//! 2. Read-state follows the source-specific rules and survives the
//!    optimistic-update/rollback contract
//! 3. A failed source degrades to a partial feed, never an aborted one
//! 4. Batch delete respects deletability and tolerates per-item failures

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use inbox::feed::FeedService;
use inbox::models::{NotificationKey, Source};
use inbox::session::Session;
use inbox::store::memory::MemoryStore;
use inbox::store::DocumentStore;

fn ts(minutes_ago: i64) -> String {
    (Utc::now() - chrono::Duration::minutes(minutes_ago)).to_rfc3339()
}

/// The standing fixture: three general notifications (g1 read), an empty
/// personal collection unless a test adds to it, and one unread feedback
/// document with an admin reply.
async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .put("notifications/g1", json!({ "title": "g1", "message": "m1", "createdAt": ts(30) }))
        .await
        .unwrap();
    store
        .put("notifications/g2", json!({ "title": "g2", "message": "m2", "createdAt": ts(20) }))
        .await
        .unwrap();
    store
        .put("notifications/g3", json!({ "title": "g3", "message": "m3", "createdAt": ts(10) }))
        .await
        .unwrap();
    store
        .put("users/u1", json!({ "readGeneralNotificationIds": ["g1"] }))
        .await
        .unwrap();
    store
        .put(
            "users/u1/feedback/f1",
            json!({ "text": "bug report", "adminReply": "ok", "read": false, "createdAt": ts(5) }),
        )
        .await
        .unwrap();
    store
}

fn service(store: &Arc<MemoryStore>) -> FeedService<MemoryStore> {
    FeedService::new(Arc::clone(store), Session::signed_in("u1"))
}

mod aggregation {
    use super::*;

    /// Reference scenario: 4 feed entries, g1 read, 3 unread.
    #[tokio::test]
    async fn test_reference_scenario_feed_shape() {
        let store = seeded_store().await;
        let service = service(&store);

        let snapshot = service.refresh().await;
        assert!(snapshot.failures.is_empty());
        assert_eq!(snapshot.notifications.len(), 4);
        assert_eq!(snapshot.unread_count(), 3);

        let g1 = snapshot
            .notifications
            .iter()
            .find(|n| n.id == "g1" && n.source == Source::General)
            .unwrap();
        assert!(g1.read);

        let f1 = snapshot
            .notifications
            .iter()
            .find(|n| n.source == Source::FeedbackReply)
            .unwrap();
        assert_eq!(f1.title, "Admin Replied to your Feedback");
        assert_eq!(f1.message, "ok");
        assert!(!f1.read);
    }

    #[tokio::test]
    async fn test_feed_is_non_increasing_in_created_at() {
        let store = seeded_store().await;
        // Mix timestamp shapes: epoch millis alongside RFC-3339.
        store
            .put(
                "users/u1/notifications/p1",
                json!({ "title": "p1", "message": "m", "read": false,
                        "createdAt": Utc::now().timestamp_millis() - 15 * 60 * 1000 }),
            )
            .await
            .unwrap();

        let snapshot = service(&store).refresh().await;
        let times: Vec<_> = snapshot.notifications.iter().map(|n| n.created_at).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(snapshot.notifications.len(), 5);
    }

    #[tokio::test]
    async fn test_document_without_created_at_never_appears() {
        let store = seeded_store().await;
        store
            .put("notifications/half", json!({ "title": "not yet visible" }))
            .await
            .unwrap();
        store
            .put("users/u1/notifications/also-half", json!({ "title": "x", "read": false }))
            .await
            .unwrap();

        let snapshot = service(&store).refresh().await;
        assert!(snapshot.notifications.iter().all(|n| n.id != "half" && n.id != "also-half"));
    }

    #[tokio::test]
    async fn test_colliding_ids_across_sources_both_survive() {
        let store = seeded_store().await;
        store
            .put(
                "users/u1/notifications/g1",
                json!({ "title": "personal g1", "message": "m", "read": false, "createdAt": ts(1) }),
            )
            .await
            .unwrap();

        let snapshot = service(&store).refresh().await;
        let g1s: Vec<_> = snapshot.notifications.iter().filter(|n| n.id == "g1").collect();
        assert_eq!(g1s.len(), 2);
        assert!(g1s.iter().any(|n| n.source == Source::General));
        assert!(g1s.iter().any(|n| n.source == Source::Personal));
    }

    #[tokio::test]
    async fn test_feedback_without_reply_stays_out_of_feed() {
        let store = seeded_store().await;
        store
            .put(
                "users/u1/feedback/f2",
                json!({ "text": "no reply yet", "read": false, "createdAt": ts(2) }),
            )
            .await
            .unwrap();

        let snapshot = service(&store).refresh().await;
        assert!(snapshot
            .notifications
            .iter()
            .all(|n| !(n.source == Source::FeedbackReply && n.id == "f2")));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_triggers_are_safe() {
        let store = seeded_store().await;
        let service = service(&store);

        let (a, b) = tokio::join!(service.refresh(), service.refresh());
        // One of the two may have been gated to the then-current feed;
        // the completed one carries the full merge either way.
        assert!(a.notifications.len() == 4 || b.notifications.len() == 4);
        assert_eq!(service.snapshot().await.len(), 4);
    }
}

mod read_state {
    use super::*;

    /// Marking a general notification read must survive re-aggregation
    /// even though the general document itself is untouched: the mark
    /// lives on the user profile.
    #[tokio::test]
    async fn test_general_mark_survives_reaggregation() {
        let store = seeded_store().await;
        let service = service(&store);
        service.refresh().await;

        let key = NotificationKey::new(Source::General, "g2");
        service.mark_read(&key).await.unwrap();

        let snapshot = service.refresh().await;
        let g2 = snapshot
            .notifications
            .iter()
            .find(|n| n.id == "g2" && n.source == Source::General)
            .unwrap();
        assert!(g2.read);
        assert_eq!(snapshot.unread_count(), 2);

        // The broadcast document itself carries no read flag.
        let doc = store.get("notifications/g2").await.unwrap().unwrap();
        assert!(doc.field("read").is_none());
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let store = seeded_store().await;
        let service = service(&store);
        service.refresh().await;

        let key = NotificationKey::new(Source::General, "g3");
        service.mark_read(&key).await.unwrap();
        service.mark_read(&key).await.unwrap();

        let profile = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(
            profile.field("readGeneralNotificationIds"),
            Some(&json!(["g1", "g3"]))
        );
    }

    #[tokio::test]
    async fn test_feedback_mark_persists_on_feedback_document() {
        let store = seeded_store().await;
        let service = service(&store);
        service.refresh().await;

        let key = NotificationKey::new(Source::FeedbackReply, "f1");
        service.mark_read(&key).await.unwrap();

        let doc = store.get("users/u1/feedback/f1").await.unwrap().unwrap();
        assert_eq!(doc.bool_field("read"), Some(true));
        assert_eq!(service.unread_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_mark_rolls_back_optimistic_flip() {
        let store = seeded_store().await;
        store
            .put(
                "users/u1/notifications/p1",
                json!({ "title": "p1", "message": "m", "read": false, "createdAt": ts(1) }),
            )
            .await
            .unwrap();
        let service = service(&store);
        service.refresh().await;

        store.fail_collection("users/u1/notifications", true);
        let key = NotificationKey::new(Source::Personal, "p1");
        let err = service.mark_read(&key).await.unwrap_err();
        assert!(matches!(err, inbox::errors::FeedError::Write { .. }));

        // The entry visibly reverted to unread.
        let p1 = service
            .snapshot()
            .await
            .into_iter()
            .find(|n| n.key() == key)
            .unwrap();
        assert!(!p1.read);

        // And the write path recovers once the store does.
        store.fail_collection("users/u1/notifications", false);
        service.mark_read(&key).await.unwrap();
        let doc = store.get("users/u1/notifications/p1").await.unwrap().unwrap();
        assert_eq!(doc.bool_field("read"), Some(true));
    }
}

mod degraded_reads {
    use super::*;

    #[tokio::test]
    async fn test_one_failed_source_yields_partial_feed() {
        let store = seeded_store().await;
        store.fail_collection("notifications", true);

        let snapshot = service(&store).refresh().await;
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].source, Source::General);
        // Feedback still came through.
        assert_eq!(snapshot.notifications.len(), 1);
        assert_eq!(snapshot.notifications[0].source, Source::FeedbackReply);
    }

    #[tokio::test]
    async fn test_failed_profile_read_drops_general_only() {
        let store = seeded_store().await;
        store.fail_collection("users", true);

        let snapshot = service(&store).refresh().await;
        assert!(snapshot.failures.iter().any(|f| f.source == Source::General));
        assert!(snapshot.notifications.iter().all(|n| n.source != Source::General));
        assert!(snapshot
            .notifications
            .iter()
            .any(|n| n.source == Source::FeedbackReply));
    }
}

mod selection {
    use super::*;
    use inbox::feed::SelectionMode;

    #[tokio::test]
    async fn test_mixed_selection_deletes_only_deletable_sources() {
        let store = seeded_store().await;
        store
            .put(
                "users/u1/notifications/p1",
                json!({ "title": "p1", "message": "m", "read": false, "createdAt": ts(1) }),
            )
            .await
            .unwrap();
        let service = service(&store);
        service.refresh().await;
        assert_eq!(service.snapshot().await.len(), 5);

        service.enter_selection_mode().await;
        assert!(service.toggle_select(&NotificationKey::new(Source::General, "g1")).await);
        assert!(service.toggle_select(&NotificationKey::new(Source::Personal, "p1")).await);

        let outcome = service.delete_selected().await;
        assert_eq!(outcome.deleted, vec![NotificationKey::new(Source::Personal, "p1")]);
        assert_eq!(outcome.skipped, vec![NotificationKey::new(Source::General, "g1")]);
        assert!(outcome.failed.is_empty());
        assert_eq!(service.selection_mode().await, SelectionMode::Normal);

        // The personal document is gone from the store; the general entry
        // survives even a full re-pull.
        assert!(store.get("users/u1/notifications/p1").await.unwrap().is_none());
        let snapshot = service.refresh().await;
        assert!(snapshot.notifications.iter().any(|n| n.id == "g1"));
        assert_eq!(snapshot.notifications.len(), 4);
    }

    #[tokio::test]
    async fn test_partial_delete_failure_keeps_failed_item_in_feed() {
        let store = seeded_store().await;
        store
            .put(
                "users/u1/notifications/p1",
                json!({ "title": "p1", "message": "m", "read": false, "createdAt": ts(1) }),
            )
            .await
            .unwrap();
        let service = service(&store);
        service.refresh().await;

        service.enter_selection_mode().await;
        service.toggle_select(&NotificationKey::new(Source::Personal, "p1")).await;
        service
            .toggle_select(&NotificationKey::new(Source::FeedbackReply, "f1"))
            .await;

        store.fail_collection("users/u1/feedback", true);
        let outcome = service.delete_selected().await;
        assert_eq!(outcome.deleted, vec![NotificationKey::new(Source::Personal, "p1")]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, NotificationKey::new(Source::FeedbackReply, "f1"));

        // Failed item stays visible; deleted one dropped locally.
        let feed = service.snapshot().await;
        assert!(feed.iter().any(|n| n.source == Source::FeedbackReply));
        assert!(feed.iter().all(|n| n.key() != NotificationKey::new(Source::Personal, "p1")));
    }

    #[tokio::test]
    async fn test_selection_is_composite_keyed() {
        let store = seeded_store().await;
        // A personal notification whose id collides with a general one.
        store
            .put(
                "users/u1/notifications/g1",
                json!({ "title": "personal g1", "message": "m", "read": false, "createdAt": ts(1) }),
            )
            .await
            .unwrap();
        let service = service(&store);
        service.refresh().await;

        service.enter_selection_mode().await;
        service.toggle_select(&NotificationKey::new(Source::Personal, "g1")).await;

        let outcome = service.delete_selected().await;
        assert_eq!(outcome.deleted, vec![NotificationKey::new(Source::Personal, "g1")]);

        // The general g1 was never a candidate.
        let snapshot = service.refresh().await;
        assert!(snapshot
            .notifications
            .iter()
            .any(|n| n.id == "g1" && n.source == Source::General));
    }

    #[tokio::test]
    async fn test_toggle_outside_selection_mode_selects_nothing() {
        let store = seeded_store().await;
        let service = service(&store);
        service.refresh().await;

        assert!(!service.toggle_select(&NotificationKey::new(Source::General, "g1")).await);
        assert_eq!(service.selected_count().await, 0);
    }
}
