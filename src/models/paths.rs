//! Store layout: collection paths and field names of the production
//! backend. All path construction goes through here so the read and write
//! sides of a source can never disagree on where its documents live.

/// Broadcast notifications, shared by every user.
pub const GENERAL_COLLECTION: &str = "notifications";

/// Grow-only array of general notification ids the user has opened,
/// stored on the user profile document.
pub const READ_GENERAL_FIELD: &str = "readGeneralNotificationIds";

/// Per-document read flag on personal and feedback documents.
pub const READ_FIELD: &str = "read";

/// Admin reply text on a feedback document. Only feedback documents with a
/// non-empty reply surface as notifications.
pub const ADMIN_REPLY_FIELD: &str = "adminReply";

pub const CREATED_AT_FIELD: &str = "createdAt";

pub fn user_profile(uid: &str) -> String {
    format!("users/{uid}")
}

pub fn personal_collection(uid: &str) -> String {
    format!("users/{uid}/notifications")
}

pub fn personal_doc(uid: &str, id: &str) -> String {
    format!("users/{uid}/notifications/{id}")
}

pub fn feedback_collection(uid: &str) -> String {
    format!("users/{uid}/feedback")
}

pub fn feedback_doc(uid: &str, id: &str) -> String {
    format!("users/{uid}/feedback/{id}")
}
