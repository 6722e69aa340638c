use uuid::Uuid;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Notification;
use crate::db::types::NotificationKind;
use crate::repositories;
use crate::repositories::notifications::NewNotification;

#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub(crate) kind: NotificationKind,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) action_url: Option<String>,
    pub(crate) metadata: serde_json::Value,
}

impl Outgoing {
    pub(crate) fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            action_url: None,
            metadata: serde_json::json!({}),
        }
    }

    pub(crate) fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub(crate) fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Stores the notification and wakes the recipient's open streams.
pub(crate) async fn notify(
    state: &AppState,
    user_id: &str,
    outgoing: &Outgoing,
) -> Result<Notification, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let notification = repositories::notifications::insert(
        state.db(),
        NewNotification {
            id: &id,
            user_id,
            kind: outgoing.kind,
            title: &outgoing.title,
            message: &outgoing.message,
            action_url: outgoing.action_url.as_deref(),
            metadata: outgoing.metadata.clone(),
            now: primitive_now_utc(),
        },
    )
    .await?;

    state.notifications().publish(user_id);
    metrics::record_notifications(1);
    Ok(notification)
}

pub(crate) async fn notify_many(
    state: &AppState,
    user_ids: &[String],
    outgoing: &Outgoing,
) -> Result<usize, sqlx::Error> {
    for user_id in user_ids {
        notify(state, user_id, outgoing).await?;
    }
    Ok(user_ids.len())
}

/// Best-effort delivery for side notifications; failures are logged, never surfaced.
pub(crate) async fn notify_quietly(state: &AppState, user_id: &str, outgoing: &Outgoing) {
    if let Err(err) = notify(state, user_id, outgoing).await {
        tracing::warn!(error = %err, user_id, title = %outgoing.title, "Failed to send notification");
    }
}

/// Tells open streams to reload after read flags changed.
pub(crate) fn announce_change(state: &AppState, user_id: &str) {
    state.notifications().publish(user_id);
}
