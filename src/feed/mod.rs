//! The pull side of the engine: refresh-driven feed aggregation, read-state
//! reconciliation, and the selection/batch-delete workflow.
//!
//! [`FeedService`] owns a disposable in-memory feed snapshot derived from
//! the three source collections. The raw collections are the sole source
//! of truth; every refresh rebuilds the feed from scratch. The push side
//! (the live unread badge) lives in [`crate::badge`].

pub mod aggregate;
pub mod read_state;
pub mod readers;
pub mod selection;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::errors::FeedError;
use crate::models::paths;
use crate::models::{Notification, NotificationKey, Source};
use crate::session::Session;
use crate::store::{DocumentStore, StoreError};

pub use selection::{DeleteOutcome, SelectionMode};

/// One source's read failed during a refresh. The feed still carries the
/// other sources' entries.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: Source,
    pub error: StoreError,
}

/// Result of one refresh: the merged feed plus any degraded sources.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub notifications: Vec<Notification>,
    pub failures: Vec<SourceFailure>,
}

impl FeedSnapshot {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

/// The notification feed for one signed-in session.
///
/// Not subscription-driven: a refresh is a batch pull over the three
/// source collections, run on view open and on pull-to-refresh. Callers
/// share it behind an `Arc`.
pub struct FeedService<S: DocumentStore> {
    store: Arc<S>,
    session: Session,
    feed: RwLock<Vec<Notification>>,
    selection: Mutex<selection::SelectionState>,
    /// Gates duplicate concurrent refresh triggers.
    refreshing: AtomicBool,
    /// Cleared by `close()`; completions check it before mutating state.
    open: AtomicBool,
    /// Read marks currently in flight, for idempotent re-marks.
    marking: DashMap<NotificationKey, ()>,
}

impl<S: DocumentStore> FeedService<S> {
    pub fn new(store: Arc<S>, session: Session) -> Self {
        Self {
            store,
            session,
            feed: RwLock::new(Vec::new()),
            selection: Mutex::new(selection::SelectionState::new()),
            refreshing: AtomicBool::new(false),
            open: AtomicBool::new(true),
            marking: DashMap::new(),
        }
    }

    /// Re-pull all three sources and rebuild the feed.
    ///
    /// Signed-out sessions get an empty snapshot. A refresh triggered
    /// while one is already in flight returns the current feed unchanged;
    /// the in-flight one wins. A failed source degrades to a partial feed
    /// and is reported in `failures`.
    pub async fn refresh(&self) -> FeedSnapshot {
        let Some(uid) = self.session.user_id() else {
            return FeedSnapshot::default();
        };
        if !self.open.load(Ordering::Acquire) {
            return FeedSnapshot::default();
        }
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh already in flight, returning current feed");
            return FeedSnapshot {
                notifications: self.feed.read().await.clone(),
                failures: Vec::new(),
            };
        }

        // Profile read and the three source reads are independent.
        let profile_path = paths::user_profile(uid);
        let (profile, mut out) = tokio::join!(
            self.store.get(&profile_path),
            readers::read_all(self.store.as_ref(), uid),
        );

        let read_ids = match profile {
            Ok(doc) => read_state::read_ids_from_profile(doc.as_ref()),
            Err(error) => {
                // Without the profile the general read-state is unknowable;
                // drop the source rather than show every entry unread.
                warn!(%error, "failed to read user profile, dropping general source");
                out.general.clear();
                if !out.failures.iter().any(|f| f.source == Source::General) {
                    out.failures.push(SourceFailure {
                        source: Source::General,
                        error,
                    });
                }
                HashSet::new()
            }
        };
        read_state::annotate_general(&mut out.general, &read_ids);

        let merged = aggregate::aggregate(vec![out.general, out.personal, out.feedback]);
        self.refreshing.store(false, Ordering::Release);

        if !self.open.load(Ordering::Acquire) {
            // View went away while the reads were outstanding.
            return FeedSnapshot {
                notifications: Vec::new(),
                failures: out.failures,
            };
        }

        debug!(
            entries = merged.len(),
            degraded = out.failures.len(),
            "feed refreshed"
        );
        *self.feed.write().await = merged.clone();
        FeedSnapshot {
            notifications: merged,
            failures: out.failures,
        }
    }

    /// The current feed without touching the store.
    pub async fn snapshot(&self) -> Vec<Notification> {
        self.feed.read().await.clone()
    }

    /// Unread entries in the current feed (the feed-header count, distinct
    /// from the navigation badge).
    pub async fn unread_count(&self) -> usize {
        self.feed.read().await.iter().filter(|n| !n.read).count()
    }

    /// Mark one notification read: optimistic in-memory flip first, then
    /// the source-specific write; rolled back if the write fails.
    ///
    /// Idempotent: already-read entries, entries with a mark in flight,
    /// and entries no longer in the feed are no-ops with zero writes.
    pub async fn mark_read(&self, key: &NotificationKey) -> Result<(), FeedError> {
        let Some(uid) = self.session.user_id() else {
            return Ok(());
        };
        if self.marking.contains_key(key) {
            return Ok(());
        }
        {
            let mut feed = self.feed.write().await;
            match feed.iter_mut().find(|n| n.key() == *key) {
                Some(entry) if entry.read => return Ok(()),
                Some(entry) => entry.read = true,
                None => return Ok(()),
            }
        }

        self.marking.insert(key.clone(), ());
        let result = read_state::persist_mark_read(self.store.as_ref(), uid, key).await;
        self.marking.remove(key);

        if let Err(cause) = result {
            warn!(key = %key, error = %cause, "read mark failed to persist, rolling back");
            let mut feed = self.feed.write().await;
            if let Some(entry) = feed.iter_mut().find(|n| n.key() == *key) {
                entry.read = false;
            }
            return Err(FeedError::Write {
                key: key.clone(),
                cause,
            });
        }
        debug!(key = %key, "read mark persisted");
        Ok(())
    }

    pub async fn selection_mode(&self) -> SelectionMode {
        self.selection.lock().await.mode
    }

    pub async fn enter_selection_mode(&self) {
        self.selection.lock().await.enter();
    }

    pub async fn exit_selection_mode(&self) {
        self.selection.lock().await.exit();
    }

    /// Toggle a feed entry's membership in the selection; returns whether
    /// it is selected afterwards. No-op outside selection mode.
    pub async fn toggle_select(&self, key: &NotificationKey) -> bool {
        self.selection.lock().await.toggle(key)
    }

    pub async fn selected_count(&self) -> usize {
        self.selection.lock().await.selected.len()
    }

    /// Delete the selected entries. Non-deletable (general) selections are
    /// skipped; per-item failures leave their entry in the feed. On
    /// completion the selection clears and the mode returns to normal.
    pub async fn delete_selected(&self) -> DeleteOutcome {
        let Some(uid) = self.session.user_id() else {
            return DeleteOutcome::default();
        };
        let selected = {
            let mut selection = self.selection.lock().await;
            std::mem::take(&mut selection.selected)
        };
        let feed_snapshot = self.feed.read().await.clone();
        let outcome =
            selection::delete_batch(self.store.as_ref(), uid, &feed_snapshot, selected).await;

        {
            let deleted: HashSet<&NotificationKey> = outcome.deleted.iter().collect();
            let mut feed = self.feed.write().await;
            feed.retain(|n| !deleted.contains(&n.key()));
        }
        self.selection.lock().await.exit();
        outcome
    }

    /// Leave the notification view: in-flight refresh completions stop
    /// mutating state from here on.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_signed_out_refresh_is_empty() {
        let service = FeedService::new(Arc::new(MemoryStore::new()), Session::signed_out());
        let snapshot = service.refresh().await;
        assert!(snapshot.notifications.is_empty());
        assert!(snapshot.failures.is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_mark_read_is_noop() {
        let service = FeedService::new(Arc::new(MemoryStore::new()), Session::signed_out());
        let key = NotificationKey::new(Source::Personal, "p1");
        assert!(service.mark_read(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_service_refresh_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(
                "notifications/g1",
                serde_json::json!({ "title": "t", "createdAt": "2024-05-01T12:00:00Z" }),
            )
            .await
            .unwrap();
        let service = FeedService::new(store, Session::signed_in("u1"));
        service.close();
        assert!(service.refresh().await.notifications.is_empty());
    }
}
