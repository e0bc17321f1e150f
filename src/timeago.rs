//! Coarse relative-time rendering for notification cards.

use chrono::{DateTime, Utc};

const INTERVALS: &[(i64, &str)] = &[
    (31_536_000, "years"),
    (2_592_000, "months"),
    (86_400, "days"),
    (3_600, "hours"),
    (60, "minutes"),
];

/// Render `created_at` relative to `now`: "5 minutes ago", "2 days ago",
/// falling back to "Just now" for anything under a minute (or in the
/// future, which clock skew can produce).
pub fn format(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - created_at).num_seconds();
    for (unit_secs, unit) in INTERVALS {
        if seconds > *unit_secs {
            return format!("{} {unit} ago", seconds / unit_secs);
        }
    }
    "Just now".to_string()
}
