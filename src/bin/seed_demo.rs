//! Seed an in-memory store with sample data and exercise both pipelines:
//! a feed refresh and the live badge. Smoke-test utility, not shipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use inbox::badge::{self, BadgeCounter};
use inbox::feed::FeedService;
use inbox::session::Session;
use inbox::store::memory::MemoryStore;
use inbox::timeago;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = inbox::config::load();
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();

    store
        .put(
            "notifications/g1",
            json!({
                "title": "Scheduled maintenance",
                "message": "The service will be briefly unavailable tonight.",
                "createdAt": (now - chrono::Duration::hours(6)).to_rfc3339(),
            }),
        )
        .await?;
    store
        .put(
            "users/u1/notifications/p1",
            json!({
                "title": "Welcome!",
                "message": "Thanks for signing up.",
                "read": false,
                "createdAt": (now - chrono::Duration::minutes(30)).to_rfc3339(),
            }),
        )
        .await?;
    store
        .put(
            "users/u1/feedback/f1",
            json!({
                "text": "The app crashes on startup",
                "adminReply": "Fixed in the latest release, please update.",
                "read": false,
                "createdAt": (now - chrono::Duration::days(2)).to_rfc3339(),
            }),
        )
        .await?;

    let session = Session::signed_in("u1");
    let counter = BadgeCounter::start(Arc::clone(&store), &session, config.badge_debounce());
    let service = FeedService::new(Arc::clone(&store), session);

    let snapshot = service.refresh().await;
    println!("feed ({} entries):", snapshot.notifications.len());
    for n in &snapshot.notifications {
        println!(
            "  [{}] {} — {} ({}{})",
            n.source,
            n.title,
            n.message,
            timeago::format(n.created_at, now),
            if n.read { ", read" } else { "" },
        );
    }

    // Give the badge fold a moment past its debounce window.
    let mut watch = counter.watch();
    if *watch.borrow() == 0 {
        tokio::time::timeout(Duration::from_secs(1), watch.changed()).await??;
    }
    let total = *watch.borrow();
    println!("badge: {} (shown as {:?})", total, badge::display(total));

    Ok(())
}
