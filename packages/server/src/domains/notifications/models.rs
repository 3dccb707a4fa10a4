use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::NotificationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible acknowledgment (toast). Becomes a [`Notification`] once the
/// center stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::error("Permission Denied", message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub kind: NoticeKind,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn from_notice(notice: Notice, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            title: notice.title,
            message: notice.message,
            kind: notice.kind,
            read: false,
            timestamp,
        }
    }
}
