use thiserror::Error;

use crate::models::NotificationKey;
use crate::store::StoreError;

/// Operation-level failures of the feed engine.
///
/// Reader failures during a refresh are deliberately not here: a degraded
/// source is reported as data on the snapshot
/// ([`crate::feed::FeedSnapshot::failures`]) so the other two sources
/// still produce a feed. Nothing in this taxonomy is fatal.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A read-state mark failed to persist. The optimistic in-memory flip
    /// has already been rolled back by the time this is returned.
    #[error("failed to persist read state for {key}: {cause}")]
    Write {
        key: NotificationKey,
        #[source]
        cause: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
