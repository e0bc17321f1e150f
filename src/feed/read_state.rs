//! Per-source read-state rules and the write paths that persist a mark.
//!
//! | source         | read =                                        |
//! |----------------|-----------------------------------------------|
//! | general        | id ∈ profile `readGeneralNotificationIds`     |
//! | personal       | the document's own `read` field               |
//! | feedback-reply | the document's own `read` field (default off) |
//!
//! Each source also has exactly one correct write path for marking read;
//! using the wrong one persists nothing.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::models::paths::{self, READ_FIELD, READ_GENERAL_FIELD};
use crate::models::{Notification, NotificationKey, Source};
use crate::store::{Document, DocumentStore, FieldWrite, MergeFields, StoreError};

/// Extract the read-ids set from the user profile document.
pub(crate) fn read_ids_from_profile(profile: Option<&Document>) -> HashSet<String> {
    profile
        .and_then(|doc| doc.field(READ_GENERAL_FIELD))
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve read-state for general entries against the profile set.
/// Personal and feedback entries already carry their own flag.
pub(crate) fn annotate_general(batch: &mut [Notification], read_ids: &HashSet<String>) {
    for notification in batch {
        debug_assert_eq!(notification.source, Source::General);
        notification.read = read_ids.contains(&notification.id);
    }
}

/// Persist a read mark through the source-specific write path.
///
/// General marks are an idempotent set-union append on the profile;
/// duplicate marks are harmless. The other two flip the document's own
/// flag.
pub(crate) async fn persist_mark_read<S: DocumentStore>(
    store: &S,
    uid: &str,
    key: &NotificationKey,
) -> Result<(), StoreError> {
    match key.source {
        Source::General => {
            let mut fields = MergeFields::new();
            fields.insert(
                READ_GENERAL_FIELD.to_string(),
                FieldWrite::ArrayUnion(vec![json!(key.id)]),
            );
            store.set_merge(&paths::user_profile(uid), fields).await
        }
        Source::Personal => {
            store
                .update_field(&paths::personal_doc(uid, &key.id), READ_FIELD, json!(true))
                .await
        }
        Source::FeedbackReply => {
            store
                .update_field(&paths::feedback_doc(uid, &key.id), READ_FIELD, json!(true))
                .await
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;
    use serde_json::Map;

    fn profile_with(ids: Value) -> Document {
        let mut fields = Map::new();
        fields.insert(READ_GENERAL_FIELD.to_string(), ids);
        Document {
            id: "u1".to_string(),
            fields,
        }
    }

    #[test]
    fn test_read_ids_missing_profile_is_empty() {
        assert!(read_ids_from_profile(None).is_empty());
    }

    #[test]
    fn test_read_ids_ignores_non_string_entries() {
        let profile = profile_with(json!(["g1", 7, null, "g2"]));
        let ids = read_ids_from_profile(Some(&profile));
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("g1") && ids.contains("g2"));
    }

    #[test]
    fn test_annotate_general_flags_only_listed_ids() {
        let mut batch = vec![
            Notification {
                id: "g1".into(),
                source: Source::General,
                title: String::new(),
                message: String::new(),
                created_at: Utc::now(),
                read: false,
            },
            Notification {
                id: "g2".into(),
                source: Source::General,
                title: String::new(),
                message: String::new(),
                created_at: Utc::now(),
                read: false,
            },
        ];
        let read_ids: HashSet<String> = ["g1".to_string()].into();
        annotate_general(&mut batch, &read_ids);
        assert!(batch[0].read);
        assert!(!batch[1].read);
    }

    #[tokio::test]
    async fn test_general_mark_lands_on_profile_not_document() {
        let store = MemoryStore::new();
        store
            .put("notifications/g1", json!({ "title": "t" }))
            .await
            .unwrap();

        let key = NotificationKey::new(Source::General, "g1");
        persist_mark_read(&store, "u1", &key).await.unwrap();

        // General document untouched; profile carries the mark.
        let general = store.get("notifications/g1").await.unwrap().unwrap();
        assert!(general.field(READ_FIELD).is_none());
        let profile = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(profile.field(READ_GENERAL_FIELD), Some(&json!(["g1"])));
    }

    #[tokio::test]
    async fn test_personal_mark_flips_document_flag() {
        let store = MemoryStore::new();
        store
            .put("users/u1/notifications/p1", json!({ "read": false }))
            .await
            .unwrap();

        let key = NotificationKey::new(Source::Personal, "p1");
        persist_mark_read(&store, "u1", &key).await.unwrap();

        let doc = store.get("users/u1/notifications/p1").await.unwrap().unwrap();
        assert_eq!(doc.bool_field(READ_FIELD), Some(true));
    }

    #[tokio::test]
    async fn test_feedback_mark_flips_feedback_document() {
        let store = MemoryStore::new();
        store
            .put("users/u1/feedback/f1", json!({ "adminReply": "ok" }))
            .await
            .unwrap();

        let key = NotificationKey::new(Source::FeedbackReply, "f1");
        persist_mark_read(&store, "u1", &key).await.unwrap();

        let doc = store.get("users/u1/feedback/f1").await.unwrap().unwrap();
        assert_eq!(doc.bool_field(READ_FIELD), Some(true));
    }
}
