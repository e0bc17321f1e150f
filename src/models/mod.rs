pub mod notification;
pub mod paths;

pub use notification::{Notification, NotificationKey, Source, FEEDBACK_REPLY_TITLE};
