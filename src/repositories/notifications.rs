use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Notification;
use crate::db::types::NotificationKind;

const COLUMNS: &str = "id, user_id, type, title, message, read, created_at, action_url, metadata";

pub(crate) struct NewNotification<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) kind: NotificationKind,
    pub(crate) title: &'a str,
    pub(crate) message: &'a str,
    pub(crate) action_url: Option<&'a str>,
    pub(crate) metadata: serde_json::Value,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn insert(
    pool: &PgPool,
    params: NewNotification<'_>,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "INSERT INTO notifications (id, user_id, type, title, message, read, created_at, action_url, metadata)
         VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $8)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.kind)
    .bind(params.title)
    .bind(params.message)
    .bind(params.now)
    .bind(params.action_url)
    .bind(Json(params.metadata))
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    unread_only: bool,
    skip: i64,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {COLUMNS}
         FROM notifications
         WHERE user_id = $1 AND (NOT $2 OR read = FALSE)
         ORDER BY created_at DESC, id DESC
         OFFSET $3 LIMIT $4"
    ))
    .bind(user_id)
    .bind(unread_only)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_unread(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Marks one of the user's notifications read. `false` when it does not belong to them.
pub(crate) async fn mark_read(pool: &PgPool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_all_read(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
            .bind(user_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}
