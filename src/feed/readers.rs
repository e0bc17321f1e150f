//! Source readers: one query per origin collection, each mapped into the
//! common [`Notification`] shape.
//!
//! A failed read on one source never aborts the other two; it degrades to
//! an empty contribution and is reported on the refresh result.

use tracing::warn;

use crate::models::notification::parse_created_at;
use crate::models::paths::{
    self, ADMIN_REPLY_FIELD, CREATED_AT_FIELD, GENERAL_COLLECTION, READ_FIELD,
};
use crate::models::{Notification, Source, FEEDBACK_REPLY_TITLE};
use crate::store::{Direction, Document, DocumentStore, QueryOptions, StoreError};

use super::SourceFailure;

/// Raw reader output: the three source batches in reader order, plus the
/// sources that failed. Read-state for general entries is resolved later
/// against the profile read-ids set.
pub(crate) struct ReaderOutput {
    pub general: Vec<Notification>,
    pub personal: Vec<Notification>,
    pub feedback: Vec<Notification>,
    pub failures: Vec<SourceFailure>,
}

fn map_general(doc: &Document) -> Option<Notification> {
    let created_at = parse_created_at(doc.field(CREATED_AT_FIELD)?)?;
    Some(Notification {
        id: doc.id.clone(),
        source: Source::General,
        title: doc.str_field("title").unwrap_or_default().to_string(),
        // Older general documents used `body` instead of `message`.
        message: doc
            .str_field("message")
            .or_else(|| doc.str_field("body"))
            .unwrap_or_default()
            .to_string(),
        created_at,
        read: false,
    })
}

fn map_personal(doc: &Document) -> Option<Notification> {
    let created_at = parse_created_at(doc.field(CREATED_AT_FIELD)?)?;
    Some(Notification {
        id: doc.id.clone(),
        source: Source::Personal,
        title: doc.str_field("title").unwrap_or_default().to_string(),
        message: doc
            .str_field("message")
            .or_else(|| doc.str_field("body"))
            .unwrap_or_default()
            .to_string(),
        created_at,
        read: doc.bool_field(READ_FIELD).unwrap_or(false),
    })
}

/// Only feedback documents carrying a non-empty admin reply surface as
/// notifications. A missing `read` flag means unread: a first-time reply
/// has never been seen.
fn map_feedback(doc: &Document) -> Option<Notification> {
    let reply = doc.str_field(ADMIN_REPLY_FIELD).filter(|r| !r.is_empty())?;
    let created_at = parse_created_at(doc.field(CREATED_AT_FIELD)?)?;
    Some(Notification {
        id: doc.id.clone(),
        source: Source::FeedbackReply,
        title: FEEDBACK_REPLY_TITLE.to_string(),
        message: reply.to_string(),
        created_at,
        read: doc.bool_field(READ_FIELD).unwrap_or(false),
    })
}

async fn read_general<S: DocumentStore>(store: &S) -> Result<Vec<Notification>, StoreError> {
    let opts = QueryOptions::new().order_by(CREATED_AT_FIELD, Direction::Descending);
    let docs = store.query(GENERAL_COLLECTION, &opts).await?;
    Ok(docs.iter().filter_map(map_general).collect())
}

async fn read_personal<S: DocumentStore>(
    store: &S,
    uid: &str,
) -> Result<Vec<Notification>, StoreError> {
    let opts = QueryOptions::new().order_by(CREATED_AT_FIELD, Direction::Descending);
    let docs = store.query(&paths::personal_collection(uid), &opts).await?;
    Ok(docs.iter().filter_map(map_personal).collect())
}

/// Feedback is queried unordered: its position in the feed comes from the
/// reply timestamp, not document order.
async fn read_feedback<S: DocumentStore>(
    store: &S,
    uid: &str,
) -> Result<Vec<Notification>, StoreError> {
    let docs = store
        .query(&paths::feedback_collection(uid), &QueryOptions::new())
        .await?;
    Ok(docs.iter().filter_map(map_feedback).collect())
}

/// Issue all three source reads concurrently and collect what survives.
pub(crate) async fn read_all<S: DocumentStore>(store: &S, uid: &str) -> ReaderOutput {
    let (general, personal, feedback) = tokio::join!(
        read_general(store),
        read_personal(store, uid),
        read_feedback(store, uid),
    );

    let mut failures = Vec::new();
    let mut settle = |source: Source, result: Result<Vec<Notification>, StoreError>| match result {
        Ok(batch) => batch,
        Err(error) => {
            warn!(%source, %error, "source read failed, continuing with partial feed");
            failures.push(SourceFailure { source, error });
            Vec::new()
        }
    };

    ReaderOutput {
        general: settle(Source::General, general),
        personal: settle(Source::Personal, personal),
        feedback: settle(Source::FeedbackReply, feedback),
        failures,
    }
}

// ── Tests ─────────────────────────────────────────────────────
