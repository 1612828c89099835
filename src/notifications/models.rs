// src/notifications/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::helpers::deserialize_timestamp;
use crate::common::PortalResult;
use crate::store::{to_fields, Fields};

// ============================================================================
// Notification Models
// ============================================================================

/// Notification type; unknown values read as `Alert`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Project,
    Application,
    Invoice,
    Success,
    #[default]
    #[serde(other)]
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The `notifications/{id}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub sender: Option<SenderInfo>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A notification waiting to be written
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub sender: Option<SenderInfo>,
}

impl NewNotification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            link: None,
            sender: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn sender(mut self, sender: SenderInfo) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Document fields for an unread notification created at `now`
    pub fn into_fields(self, now: DateTime<Utc>) -> PortalResult<Fields> {
        to_fields(&Notification {
            id: String::new(),
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            body: self.body,
            link: self.link,
            read: false,
            sender: self.sender,
            created_at: now,
        })
    }
}

/// What the UI shows for a burst of fresh notifications
#[derive(Debug, Clone, PartialEq)]
pub enum Toast {
    Single(Notification),
    /// Several notifications arrived in one update
    Summary { count: usize },
}

impl Toast {
    pub fn message(&self) -> String {
        match self {
            Toast::Single(n) if n.body.is_empty() => n.title.clone(),
            Toast::Single(n) => format!("{}: {}", n.title, n.body),
            Toast::Summary { count } => format!("{} new notifications", count),
        }
    }
}
