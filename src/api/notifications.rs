use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde_json::json;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, CurrentUser};
use crate::api::pagination;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::notification::{
    DeliveryResponse, NotificationCreate, NotificationListQuery, NotificationListResponse,
    NotificationResponse,
};
use crate::services::access_policy::can_broadcast;
use crate::services::notification_hub::NotificationChanged;
use crate::services::notifications::{self, Outgoing};

/// Items carried by each stream snapshot.
const SNAPSHOT_LIMIT: i64 = 20;
const KEEP_ALIVE_SECONDS: u64 = 15;
const MAX_TITLE_CHARS: usize = 200;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(send_notification))
        .route("/stream", get(stream_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/:notification_id/read", post(mark_read))
}

async fn load_snapshot(
    state: &AppState,
    user_id: &str,
    unread_only: bool,
    skip: i64,
    limit: i64,
) -> Result<NotificationListResponse, sqlx::Error> {
    let items =
        repositories::notifications::list_for_user(state.db(), user_id, unread_only, skip, limit)
            .await?;
    let unread = repositories::notifications::count_unread(state.db(), user_id).await?;
    Ok(NotificationListResponse {
        items: items.into_iter().map(NotificationResponse::from_db).collect(),
        unread,
    })
}

async fn list_notifications(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<NotificationListQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let (skip, limit) = pagination::window(params.skip, params.limit);
    let snapshot = load_snapshot(&state, &user.id, params.unread_only, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load notifications"))?;
    Ok(Json(snapshot))
}

async fn mark_read(
    Path(notification_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let updated = repositories::notifications::mark_read(state.db(), &notification_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update notification"))?;
    if !updated {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    notifications::announce_change(&state, &user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = repositories::notifications::mark_all_read(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update notifications"))?;
    if updated > 0 {
        notifications::announce_change(&state, &user.id);
    }
    Ok(Json(json!({ "updated": updated })))
}

async fn send_notification(
    CurrentUser(sender): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NotificationCreate>,
) -> Result<(StatusCode, Json<DeliveryResponse>), ApiError> {
    require_role(&sender, can_broadcast, "Not allowed to send notifications")?;

    let title = payload.title.trim();
    let message = payload.message.trim();
    if title.is_empty() || message.is_empty() {
        return Err(ApiError::BadRequest("title and message are required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }

    let recipients = match (payload.user_id, payload.role) {
        (Some(user_id), None) => {
            let exists = repositories::profiles::find_by_id(state.db(), &user_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load recipient"))?
                .is_some();
            if !exists {
                return Err(ApiError::NotFound("Recipient not found".to_string()));
            }
            vec![user_id]
        }
        (None, Some(role)) => repositories::profiles::active_ids_by_role(state.db(), role)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load recipients"))?,
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of user_id or role".to_string(),
            ))
        }
    };

    let mut outgoing = Outgoing::new(payload.kind, title, message);
    if let Some(url) = payload.action_url {
        outgoing = outgoing.with_action_url(url);
    }
    if let Some(metadata) = payload.metadata {
        outgoing = outgoing.with_metadata(metadata);
    }

    let delivered = notifications::notify_many(&state, &recipients, &outgoing)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to send notifications"))?;

    tracing::info!(sender_id = %sender.id, delivered, title = %outgoing.title, "Notifications sent");
    Ok((StatusCode::CREATED, Json(DeliveryResponse { delivered })))
}

struct StreamState {
    app: AppState,
    user_id: String,
    changes: Receiver<NotificationChanged>,
    primed: bool,
}

async fn snapshot_event(app: &AppState, user_id: &str) -> Event {
    match load_snapshot(app, user_id, false, 0, SNAPSHOT_LIMIT).await {
        Ok(snapshot) => Event::default()
            .event("notifications")
            .json_data(snapshot)
            .unwrap_or_else(|err| Event::default().event("error").data(err.to_string())),
        Err(err) => {
            tracing::warn!(error = %err, user_id, "Failed to load notification snapshot");
            Event::default().event("error").data("Failed to load notifications")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wakeup {
    Changed,
    Resync { skipped: u64 },
}

/// Waits for a change that concerns `user_id`. `None` once the hub is gone.
async fn wait_for_change(changes: &mut Receiver<NotificationChanged>, user_id: &str) -> Option<Wakeup> {
    loop {
        match changes.recv().await {
            Ok(change) if change.user_id == user_id => return Some(Wakeup::Changed),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => return Some(Wakeup::Resync { skipped }),
            Err(RecvError::Closed) => return None,
        }
    }
}

/// A lagged receiver resyncs with a fresh snapshot instead of replaying what it missed.
async fn next_event(mut stream: StreamState) -> Option<(Result<Event, Infallible>, StreamState)> {
    if !stream.primed {
        stream.primed = true;
        let event = snapshot_event(&stream.app, &stream.user_id).await;
        return Some((Ok(event), stream));
    }

    if let Wakeup::Resync { skipped } = wait_for_change(&mut stream.changes, &stream.user_id).await? {
        tracing::debug!(user_id = %stream.user_id, skipped, "Notification stream lagged");
    }

    let event = snapshot_event(&stream.app, &stream.user_id).await;
    Some((Ok(event), stream))
}

async fn stream_notifications(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let changes = state.notifications().subscribe();
    tracing::debug!(user_id = %user.id, "Notification stream opened");

    let initial = StreamState { app: state, user_id: user.id, changes, primed: false };
    Sse::new(stream::unfold(initial, next_event))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECONDS)))
}
