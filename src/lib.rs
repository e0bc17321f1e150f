//! inbox — notification aggregation and read-state engine.
//!
//! Merges three independently-updated remote collections (broadcast,
//! per-user, admin feedback replies) into one deduplicated, time-ordered
//! feed, reconciles per-source read-state, and derives a live unread
//! badge from standing subscriptions.

pub mod badge;
pub mod config;
pub mod errors;
pub mod feed;
pub mod models;
pub mod session;
pub mod store;
pub mod timeago;
