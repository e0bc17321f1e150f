//! Remote document store boundary.
//!
//! The engine never talks to a concrete backend directly; everything goes
//! through the [`DocumentStore`] trait: point reads, one-shot queries,
//! live snapshot subscriptions, merge-writes, field updates and deletes.
//! [`memory::MemoryStore`] is the bundled reference implementation used by
//! the tests and the seed utility; production integrations implement the
//! trait against their own backend.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;

/// Errors surfaced by the store adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A document as the store returns it: an id plus a flat JSON field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filters plus an optional sort key, the full extent of what the
/// backing store's query language offers this client.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub order_by: Option<(String, Direction)>,
    pub filters: Vec<(String, Value)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn with_filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    /// Whether a document satisfies every equality filter. A missing field
    /// never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| doc.field(field) == Some(expected))
    }
}

/// A single field in a merge-write.
///
/// `ArrayUnion` is the set-union append used by the grow-only
/// `readGeneralNotificationIds` set: values already present are not
/// duplicated. A plain `Set` of an array overwrites.
#[derive(Debug, Clone)]
pub enum FieldWrite {
    Set(Value),
    ArrayUnion(Vec<Value>),
}

pub type MergeFields = BTreeMap<String, FieldWrite>;

/// Convenience: turn a JSON object into plain `Set` merge fields.
pub fn set_fields(object: Value) -> MergeFields {
    match object {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, FieldWrite::Set(v)))
            .collect(),
        _ => MergeFields::new(),
    }
}

/// One delivery on a live collection query: a full result-set snapshot, or
/// the error that interrupted it. The subscription stays registered after
/// an error; the next matching mutation produces a fresh snapshot.
pub type CollectionSnapshot = Result<Vec<Document>, StoreError>;

/// One delivery on a live single-document watch. `Ok(None)` means the
/// document does not exist (or was deleted).
pub type DocumentSnapshot = Result<Option<Document>, StoreError>;

/// Runs the registered teardown exactly once, on drop.
struct Unsubscriber(Option<Box<dyn FnOnce() + Send>>);

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Live collection query handle. Dropping it unregisters the watcher.
pub struct CollectionSubscription {
    rx: mpsc::UnboundedReceiver<CollectionSnapshot>,
    _unsub: Unsubscriber,
}

impl CollectionSubscription {
    /// Build a subscription from a snapshot channel and a teardown hook.
    /// Store implementations call this; consumers only receive.
    pub fn new(
        rx: mpsc::UnboundedReceiver<CollectionSnapshot>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            _unsub: Unsubscriber(Some(Box::new(unsubscribe))),
        }
    }

    /// Next snapshot, or `None` once the store side has closed the feed.
    pub async fn recv(&mut self) -> Option<CollectionSnapshot> {
        self.rx.recv().await
    }
}

impl futures::Stream for CollectionSubscription {
    type Item = CollectionSnapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Live single-document watch handle. Dropping it unregisters the watcher.
pub struct DocumentSubscription {
    rx: mpsc::UnboundedReceiver<DocumentSnapshot>,
    _unsub: Unsubscriber,
}

impl DocumentSubscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<DocumentSnapshot>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            _unsub: Unsubscriber(Some(Box::new(unsubscribe))),
        }
    }

    pub async fn recv(&mut self) -> Option<DocumentSnapshot> {
        self.rx.recv().await
    }
}

impl futures::Stream for DocumentSubscription {
    type Item = DocumentSnapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// The capability set this engine consumes from the remote store.
///
/// Paths are slash-separated; the final segment of a document path is the
/// document id, everything before it is the collection path
/// (`users/u1/feedback/f1` → collection `users/u1/feedback`, id `f1`).
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// One-shot query over a collection.
    async fn query(
        &self,
        collection: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// Live query: delivers the current result set immediately, then a
    /// fresh snapshot after every mutation that touches the collection.
    fn subscribe(&self, collection: &str, opts: &QueryOptions) -> CollectionSubscription;

    /// Live single-document watch with the same delivery contract.
    fn subscribe_doc(&self, path: &str) -> DocumentSubscription;

    /// Shallow merge-write. Creates the document if absent.
    async fn set_merge(&self, path: &str, fields: MergeFields) -> Result<(), StoreError>;

    /// Single-field update on an existing document.
    async fn update_field(&self, path: &str, field: &str, value: Value)
        -> Result<(), StoreError>;

    /// Delete a document. Deleting an absent document is not an error.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        match fields {
            Value::Object(map) => Document {
                id: id.to_string(),
                fields: map,
            },
            _ => panic!("fields must be an object"),
        }
    }

    #[test]
    fn test_filter_matches_equality() {
        let opts = QueryOptions::new().with_filter("read", false);
        assert!(opts.matches(&doc("a", json!({ "read": false }))));
        assert!(!opts.matches(&doc("b", json!({ "read": true }))));
    }

    #[test]
    fn test_filter_missing_field_never_matches() {
        let opts = QueryOptions::new().with_filter("read", false);
        assert!(!opts.matches(&doc("a", json!({ "title": "x" }))));
    }

    #[test]
    fn test_no_filters_matches_everything() {
        let opts = QueryOptions::new();
        assert!(opts.matches(&doc("a", json!({}))));
    }

    #[test]
    fn test_set_fields_from_object() {
        let fields = set_fields(json!({ "title": "hi", "read": false }));
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields.get("title"), Some(FieldWrite::Set(v)) if v == "hi"));
    }

    #[test]
    fn test_set_fields_from_non_object_is_empty() {
        assert!(set_fields(json!("scalar")).is_empty());
    }
}
