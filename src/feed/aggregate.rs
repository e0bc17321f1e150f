//! The merge core: concatenate, dedup, sort.

use std::collections::HashSet;

use crate::models::{Notification, NotificationKey};

/// Merge source batches into the final feed.
///
/// Batches are concatenated in reader order (general, personal, feedback);
/// duplicates by `(source, id)` keep the first occurrence; the result is
/// stable-sorted descending by `created_at`, so entries sharing a
/// timestamp keep reader order as the tie-break.
pub fn aggregate(batches: Vec<Vec<Notification>>) -> Vec<Notification> {
    let mut seen: HashSet<NotificationKey> = HashSet::new();
    let mut feed: Vec<Notification> = Vec::new();
    for notification in batches.into_iter().flatten() {
        if seen.insert(notification.key()) {
            feed.push(notification);
        }
    }
    feed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    feed
}

// ── Tests ─────────────────────────────────────────────────────
