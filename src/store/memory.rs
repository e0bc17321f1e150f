//! In-memory reference implementation of [`DocumentStore`].
//!
//! Backs the test suite and the seed utility. Every mutation re-evaluates
//! the registered live queries and fans fresh snapshots out to their
//! channels, which is the same delivery contract a real change-feed
//! backend provides.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    set_fields, CollectionSnapshot, CollectionSubscription, Direction, Document,
    DocumentSnapshot, DocumentSubscription, DocumentStore, FieldWrite, MergeFields, QueryOptions,
    StoreError,
};

struct ColWatcher {
    collection: String,
    opts: QueryOptions,
    tx: mpsc::UnboundedSender<CollectionSnapshot>,
}

struct DocWatcher {
    path: String,
    tx: mpsc::UnboundedSender<DocumentSnapshot>,
}

#[derive(Default)]
struct Inner {
    /// collection path → (document id → fields)
    collections: DashMap<String, BTreeMap<String, Map<String, Value>>>,
    col_watchers: DashMap<Uuid, ColWatcher>,
    doc_watchers: DashMap<Uuid, DocWatcher>,
    /// Collections forced to fail, for error-path tests.
    failing: DashMap<String, ()>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn split_path(path: &str) -> Result<(&str, &str), StoreError> {
    path.rsplit_once('/')
        .filter(|(collection, id)| !collection.is_empty() && !id.is_empty())
        .ok_or_else(|| StoreError::Unavailable(format!("malformed document path: {path}")))
}

/// Total-enough ordering over the JSON values used as sort keys. Nulls and
/// missing fields sort least; cross-type comparisons are treated as equal.
fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge-write a whole JSON object at `path`. Seeding convenience.
    pub async fn put(&self, path: &str, object: Value) -> Result<(), StoreError> {
        self.set_merge(path, set_fields(object)).await
    }

    /// Force every operation on `collection` to fail (or recover). The
    /// error-handling tests flip this to exercise degraded reads and
    /// rollbacks.
    pub fn fail_collection(&self, collection: &str, failing: bool) {
        if failing {
            self.inner.failing.insert(collection.to_string(), ());
        } else {
            self.inner.failing.remove(collection);
        }
    }

    /// Number of live watchers currently registered (collection + document).
    pub fn active_watchers(&self) -> usize {
        self.inner.col_watchers.len() + self.inner.doc_watchers.len()
    }

    fn check_available(&self, collection: &str) -> Result<(), StoreError> {
        if self.inner.failing.contains_key(collection) {
            return Err(StoreError::Unavailable(format!(
                "collection {collection} is unavailable"
            )));
        }
        Ok(())
    }

    fn eval_query(&self, collection: &str, opts: &QueryOptions) -> Vec<Document> {
        let mut docs: Vec<Document> = match self.inner.collections.get(collection) {
            Some(map) => map
                .iter()
                .map(|(id, fields)| Document {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .filter(|doc| opts.matches(doc))
                .collect(),
            None => Vec::new(),
        };
        if let Some((field, direction)) = &opts.order_by {
            docs.sort_by(|a, b| {
                let ord = value_cmp(
                    a.field(field).unwrap_or(&Value::Null),
                    b.field(field).unwrap_or(&Value::Null),
                );
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        docs
    }

    fn snapshot_for(&self, collection: &str, opts: &QueryOptions) -> CollectionSnapshot {
        self.check_available(collection)?;
        Ok(self.eval_query(collection, opts))
    }

    fn read_doc(&self, collection: &str, id: &str) -> Option<Document> {
        self.inner
            .collections
            .get(collection)
            .and_then(|map| map.get(id).cloned())
            .map(|fields| Document {
                id: id.to_string(),
                fields,
            })
    }

    /// Fan the post-mutation state out to every watcher of `collection`
    /// and of the mutated document.
    fn notify(&self, collection: &str, id: &str) {
        for watcher in self.inner.col_watchers.iter() {
            if watcher.collection == collection {
                let _ = watcher
                    .tx
                    .send(self.snapshot_for(&watcher.collection, &watcher.opts));
            }
        }
        let path = format!("{collection}/{id}");
        for watcher in self.inner.doc_watchers.iter() {
            if watcher.path == path {
                let _ = watcher.tx.send(Ok(self.read_doc(collection, id)));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let (collection, id) = split_path(path)?;
        self.check_available(collection)?;
        Ok(self.read_doc(collection, id))
    }

    async fn query(
        &self,
        collection: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<Document>, StoreError> {
        self.snapshot_for(collection, opts)
    }

    fn subscribe(&self, collection: &str, opts: &QueryOptions) -> CollectionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.snapshot_for(collection, opts));
        let id = Uuid::new_v4();
        self.inner.col_watchers.insert(
            id,
            ColWatcher {
                collection: collection.to_string(),
                opts: opts.clone(),
                tx,
            },
        );
        let inner = Arc::clone(&self.inner);
        CollectionSubscription::new(rx, move || {
            inner.col_watchers.remove(&id);
        })
    }

    fn subscribe_doc(&self, path: &str) -> DocumentSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        match split_path(path) {
            Ok((collection, id)) => {
                let initial = self
                    .check_available(collection)
                    .map(|_| self.read_doc(collection, id));
                let _ = tx.send(initial);
            }
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }
        let id = Uuid::new_v4();
        self.inner.doc_watchers.insert(
            id,
            DocWatcher {
                path: path.to_string(),
                tx,
            },
        );
        let inner = Arc::clone(&self.inner);
        DocumentSubscription::new(rx, move || {
            inner.doc_watchers.remove(&id);
        })
    }

    async fn set_merge(&self, path: &str, fields: MergeFields) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        self.check_available(collection)?;
        {
            let mut map = self
                .inner
                .collections
                .entry(collection.to_string())
                .or_default();
            let doc = map.entry(id.to_string()).or_default();
            for (name, write) in fields {
                match write {
                    FieldWrite::Set(value) => {
                        doc.insert(name, value);
                    }
                    FieldWrite::ArrayUnion(values) => {
                        let entry = doc.entry(name).or_insert_with(|| Value::Array(Vec::new()));
                        if !entry.is_array() {
                            *entry = Value::Array(Vec::new());
                        }
                        let arr = entry.as_array_mut().expect("just ensured array");
                        for value in values {
                            if !arr.contains(&value) {
                                arr.push(value);
                            }
                        }
                    }
                }
            }
        }
        self.notify(collection, id);
        Ok(())
    }

    async fn update_field(
        &self,
        path: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        self.check_available(collection)?;
        {
            let mut map = self
                .inner
                .collections
                .get_mut(collection)
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            let doc = map
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            doc.insert(field.to_string(), value);
        }
        self.notify(collection, id);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        self.check_available(collection)?;
        let removed = self
            .inner
            .collections
            .get_mut(collection)
            .map(|mut map| map.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            self.notify(collection, id);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────
