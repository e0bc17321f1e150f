use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed title for notifications synthesized from admin feedback replies.
pub const FEEDBACK_REPLY_TITLE: &str = "Admin Replied to your Feedback";

/// Origin collection of a notification. Determines its storage path, its
/// read-state rule, and whether the user may delete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    General,
    Personal,
    FeedbackReply,
}

impl Source {
    /// General notifications are broadcast to everyone and can only be
    /// marked read, never deleted.
    pub fn deletable(self) -> bool {
        matches!(self, Source::Personal | Source::FeedbackReply)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::General => "general",
            Source::Personal => "personal",
            Source::FeedbackReply => "feedback-reply",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity. Ids are unique only within their source, so every
/// lookup, dedup, and delete targets `(source, id)`, never the bare id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub source: Source,
    pub id: String,
}

impl NotificationKey {
    pub fn new(source: Source, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.id)
    }
}

/// A merged feed entry. `read` is derived at merge time from the
/// source-specific rule; the raw collections remain the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub source: Source,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.source, self.id.clone())
    }
}

/// Map a store-native `createdAt` value to the one comparable timestamp
/// type the engine sorts by. Accepts RFC-3339 strings and epoch
/// milliseconds; anything else means the document is not yet fully written
/// and stays out of the feed.
pub fn parse_created_at(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let millis = n.as_i64()?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────
