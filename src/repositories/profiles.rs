use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Profile;
use crate::db::types::UserRole;

const COLUMNS: &str = "id, email, display_name, role, is_active, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!("SELECT {COLUMNS} FROM profiles WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) struct CreateProfile<'a> {
    pub(crate) id: &'a str,
    pub(crate) email: &'a str,
    pub(crate) display_name: &'a str,
    pub(crate) role: UserRole,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateProfile<'_>) -> Result<Profile, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "INSERT INTO profiles (id, email, display_name, role, is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, TRUE, $5, $5)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.email)
    .bind(params.display_name)
    .bind(params.role)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn promote_to_admin(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE profiles SET role = $1, is_active = TRUE, updated_at = $2 WHERE id = $3")
        .bind(UserRole::Admin)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn list(
    pool: &PgPool,
    role: Option<UserRole>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {COLUMNS}
         FROM profiles
         WHERE ($1::user_role IS NULL OR role = $1)
         ORDER BY created_at DESC, id
         OFFSET $2 LIMIT $3"
    ))
    .bind(role)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count(pool: &PgPool, role: Option<UserRole>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM profiles WHERE ($1::user_role IS NULL OR role = $1)",
    )
    .bind(role)
    .fetch_one(pool)
    .await
}

pub(crate) async fn count_by_role(pool: &PgPool) -> Result<Vec<(UserRole, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (UserRole, i64)>(
        "SELECT role, COUNT(*) FROM profiles GROUP BY role ORDER BY role",
    )
    .fetch_all(pool)
    .await
}

pub(crate) async fn active_ids_by_role(
    pool: &PgPool,
    role: UserRole,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM profiles WHERE role = $1 AND is_active ORDER BY created_at",
    )
    .bind(role)
    .fetch_all(pool)
    .await
}
