//! Selection mode and the batch-delete pass.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::models::paths;
use crate::models::{Notification, NotificationKey, Source};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Tapping an item marks it read and opens it.
    Normal,
    /// Tapping an item toggles its membership in the selection.
    Selecting,
}

/// Selection keyed by composite `(source, id)`, so identical ids from
/// different sources can never select each other's entry.
#[derive(Debug)]
pub(crate) struct SelectionState {
    pub mode: SelectionMode,
    pub selected: HashSet<NotificationKey>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self {
            mode: SelectionMode::Normal,
            selected: HashSet::new(),
        }
    }

    pub fn enter(&mut self) {
        self.mode = SelectionMode::Selecting;
        self.selected.clear();
    }

    pub fn exit(&mut self) {
        self.mode = SelectionMode::Normal;
        self.selected.clear();
    }

    /// Toggle membership; returns whether the key is selected afterwards.
    /// Outside selection mode this is a no-op.
    pub fn toggle(&mut self, key: &NotificationKey) -> bool {
        if self.mode != SelectionMode::Selecting {
            return false;
        }
        if !self.selected.remove(key) {
            self.selected.insert(key.clone());
            return true;
        }
        false
    }
}

/// Result of one batch-delete pass. `skipped` holds non-deletable
/// (general) selections and selections that no longer resolve to a feed
/// entry; `failed` holds per-item store errors.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub deleted: Vec<NotificationKey>,
    pub skipped: Vec<NotificationKey>,
    pub failed: Vec<(NotificationKey, StoreError)>,
}

/// Delete the selected entries one by one. A single item's failure is
/// logged and recorded, never aborts the rest of the batch.
pub(crate) async fn delete_batch<S: DocumentStore>(
    store: &S,
    uid: &str,
    feed: &[Notification],
    selected: HashSet<NotificationKey>,
) -> DeleteOutcome {
    let mut outcome = DeleteOutcome::default();

    for key in selected {
        let Some(entry) = feed.iter().find(|n| n.key() == key) else {
            outcome.skipped.push(key);
            continue;
        };
        let path = match entry.source {
            Source::Personal => paths::personal_doc(uid, &key.id),
            Source::FeedbackReply => paths::feedback_doc(uid, &key.id),
            Source::General => {
                // Broadcast notifications are never user-deletable.
                outcome.skipped.push(key);
                continue;
            }
        };
        match store.delete(&path).await {
            Ok(()) => outcome.deleted.push(key),
            Err(error) => {
                warn!(key = %key, %error, "failed to delete notification");
                outcome.failed.push((key, error));
            }
        }
    }

    info!(
        deleted = outcome.deleted.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failed.len(),
        "batch delete finished"
    );
    outcome
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> NotificationKey {
        NotificationKey::new(Source::Personal, id)
    }

    #[test]
    fn test_toggle_requires_selection_mode() {
        let mut state = SelectionState::new();
        assert!(!state.toggle(&key("p1")));
        assert!(state.selected.is_empty());
    }

    #[test]
    fn test_toggle_flips_membership() {
        let mut state = SelectionState::new();
        state.enter();
        assert!(state.toggle(&key("p1")));
        assert!(!state.toggle(&key("p1")));
        assert!(state.selected.is_empty());
    }

    #[test]
    fn test_exit_clears_selection() {
        let mut state = SelectionState::new();
        state.enter();
        state.toggle(&key("p1"));
        state.exit();
        assert_eq!(state.mode, SelectionMode::Normal);
        assert!(state.selected.is_empty());
    }

    #[test]
    fn test_reentering_clears_previous_selection() {
        let mut state = SelectionState::new();
        state.enter();
        state.toggle(&key("p1"));
        state.enter();
        assert!(state.selected.is_empty());
    }
}
