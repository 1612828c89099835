//! Notifications
//!
//! `NotificationCenter` is the recipient's live view (toasts, read and
//! delete); `NotificationDispatcher` is the writer used by the flows that
//! trigger notifications.

pub mod center;
pub mod dispatcher;
pub mod models;

#[cfg(test)]
mod tests;

pub use center::{toast_for, NotificationCenter};
pub use dispatcher::NotificationDispatcher;
pub use models::{NewNotification, Notification, NotificationKind, SenderInfo, Toast};
