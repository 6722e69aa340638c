use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::Notification;
use crate::db::types::{NotificationKind, UserRole};

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationListQuery {
    #[serde(default, alias = "unreadOnly")]
    pub(crate) unread_only: bool,
    #[serde(default)]
    pub(crate) skip: Option<i64>,
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

/// Sent to one user or to every active user holding `role`.
#[derive(Debug, Deserialize)]
pub(crate) struct NotificationCreate {
    #[serde(default, alias = "userId")]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default = "default_kind", rename = "type", alias = "kind")]
    pub(crate) kind: NotificationKind,
    pub(crate) title: String,
    pub(crate) message: String,
    #[serde(default, alias = "actionUrl")]
    pub(crate) action_url: Option<String>,
    #[serde(default)]
    pub(crate) metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NotificationResponse {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) kind: NotificationKind,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) read: bool,
    pub(crate) created_at: String,
    pub(crate) action_url: Option<String>,
    pub(crate) metadata: serde_json::Value,
}

impl NotificationResponse {
    pub(crate) fn from_db(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            read: notification.read,
            created_at: format_primitive(notification.created_at),
            action_url: notification.action_url,
            metadata: notification.metadata.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NotificationListResponse {
    pub(crate) items: Vec<NotificationResponse>,
    pub(crate) unread: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeliveryResponse {
    pub(crate) delivered: usize,
}

fn default_kind() -> NotificationKind {
    NotificationKind::Info
}
