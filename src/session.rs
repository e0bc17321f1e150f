//! Explicit session context.
//!
//! The engine never reads ambient auth state: the user identity is
//! captured here at construction time and passed into [`crate::feed::FeedService`]
//! and [`crate::badge::BadgeCounter`]. A user change means tearing the old
//! instances down and building new ones with a new `Session`, never
//! mutating one in place.

/// Authenticated-user context, or signed-out.
///
/// With no signed-in user every engine operation is a no-op returning
/// empty or zero state. Absence of auth is a normal condition, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: Option<String>,
}

impl Session {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { user_id: None }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}
