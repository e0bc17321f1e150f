//! The push side of the engine: a live unread-count badge.
//!
//! Four standing subscriptions per signed-in session — personal unread
//! count, the general id list, the profile read-ids set, and the unread
//! feedback-reply count — are folded into one total published through a
//! `tokio::sync::watch` channel. Recomputation is a pure fold over the
//! latest value of all four, debounced so near-simultaneous updates never
//! surface a transient wrong count. No fetch happens on recompute; only
//! the subscriptions move data.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::feed::read_state;
use crate::models::paths::{self, ADMIN_REPLY_FIELD, GENERAL_COLLECTION, READ_FIELD};
use crate::session::Session;
use crate::store::{DocumentStore, QueryOptions};

/// Latest value of each live source. The fold reads this, never the
/// individual deltas.
#[derive(Default)]
struct BadgeState {
    personal_unread: usize,
    general_ids: Vec<String>,
    read_general: HashSet<String>,
    feedback_unread: usize,
}

impl BadgeState {
    fn total(&self) -> u64 {
        let unread_general = self
            .general_ids
            .iter()
            .filter(|id| !self.read_general.contains(id.as_str()))
            .count();
        (self.personal_unread + unread_general + self.feedback_unread) as u64
    }
}

/// Live unread-count badge for one session.
///
/// Built on sign-in, shut down on sign-out. A user change must shut the
/// old counter down completely before starting a new one; a subscription
/// leaking across users would expose another user's data.
pub struct BadgeCounter {
    total_tx: Arc<watch::Sender<u64>>,
    total_rx: watch::Receiver<u64>,
    tasks: Vec<JoinHandle<()>>,
}

impl BadgeCounter {
    /// Establish the four subscriptions and the fold task. A signed-out
    /// session gets no subscriptions and a count pinned at zero.
    pub fn start<S: DocumentStore>(store: Arc<S>, session: &Session, debounce: Duration) -> Self {
        let (tx, total_rx) = watch::channel(0u64);
        let total_tx = Arc::new(tx);

        let Some(uid) = session.user_id() else {
            info!("badge counter started without a user, count pinned at zero");
            return Self {
                total_tx,
                total_rx,
                tasks: Vec::new(),
            };
        };
        let uid = uid.to_string();
        info!(user = %uid, "badge counter starting subscriptions");

        let state = Arc::new(Mutex::new(BadgeState::default()));
        let (dirty_tx, mut dirty_rx) = mpsc::unbounded_channel::<()>();
        let mut tasks = Vec::with_capacity(5);

        // 1. Personal unread count: live-filtered query.
        let mut sub = store.subscribe(
            &paths::personal_collection(&uid),
            &QueryOptions::new().with_filter(READ_FIELD, false),
        );
        let (st, dirty) = (Arc::clone(&state), dirty_tx.clone());
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = sub.next().await {
                match snapshot {
                    Ok(docs) => {
                        st.lock().expect("badge state lock").personal_unread = docs.len();
                        let _ = dirty.send(());
                    }
                    Err(error) => {
                        warn!(%error, "personal badge subscription error, keeping last count")
                    }
                }
            }
        }));

        // 2. All general notification ids.
        let mut sub = store.subscribe(GENERAL_COLLECTION, &QueryOptions::new());
        let (st, dirty) = (Arc::clone(&state), dirty_tx.clone());
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = sub.next().await {
                match snapshot {
                    Ok(docs) => {
                        st.lock().expect("badge state lock").general_ids =
                            docs.into_iter().map(|d| d.id).collect();
                        let _ = dirty.send(());
                    }
                    Err(error) => {
                        warn!(%error, "general badge subscription error, keeping last list")
                    }
                }
            }
        }));

        // 3. The profile's read-ids set.
        let mut sub = store.subscribe_doc(&paths::user_profile(&uid));
        let (st, dirty) = (Arc::clone(&state), dirty_tx.clone());
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = sub.next().await {
                match snapshot {
                    Ok(doc) => {
                        st.lock().expect("badge state lock").read_general =
                            read_state::read_ids_from_profile(doc.as_ref());
                        let _ = dirty.send(());
                    }
                    Err(error) => {
                        warn!(%error, "profile badge subscription error, keeping last set")
                    }
                }
            }
        }));

        // 4. Unread feedback replies. The server-side unread filter is
        // necessary but not sufficient: a reply must also exist.
        let mut sub = store.subscribe(
            &paths::feedback_collection(&uid),
            &QueryOptions::new().with_filter(READ_FIELD, false),
        );
        let (st, dirty) = (Arc::clone(&state), dirty_tx);
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = sub.next().await {
                match snapshot {
                    Ok(docs) => {
                        st.lock().expect("badge state lock").feedback_unread = docs
                            .iter()
                            .filter(|d| {
                                d.str_field(ADMIN_REPLY_FIELD)
                                    .is_some_and(|r| !r.is_empty())
                            })
                            .count();
                        let _ = dirty.send(());
                    }
                    Err(error) => {
                        warn!(%error, "feedback badge subscription error, keeping last count")
                    }
                }
            }
        }));

        // The fold: after any source moves, wait out the quiet window,
        // drain further ticks, then publish one total from the latest
        // state of all four.
        let publish = Arc::clone(&total_tx);
        tasks.push(tokio::spawn(async move {
            while dirty_rx.recv().await.is_some() {
                tokio::time::sleep(debounce).await;
                while dirty_rx.try_recv().is_ok() {}
                let total = state.lock().expect("badge state lock").total();
                let _ = publish.send(total);
            }
        }));

        Self {
            total_tx,
            total_rx,
            tasks,
        }
    }

    /// Observable count for the navigation element.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.total_rx.clone()
    }

    /// Latest published total.
    pub fn total(&self) -> u64 {
        *self.total_rx.borrow()
    }

    /// Tear down every subscription and reset the published count to
    /// zero. Called on sign-out, and before starting a counter for a
    /// different user.
    pub fn shutdown(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        info!("badge counter shutting down");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let _ = self.total_tx.send(0);
    }
}

impl Drop for BadgeCounter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Badge text for the navigation element: counts above nine collapse to
/// "9+", zero hides the badge entirely.
pub fn display(count: u64) -> String {
    match count {
        0 => String::new(),
        1..=9 => count.to_string(),
        _ => "9+".to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────
