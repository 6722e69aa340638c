use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::AuthAccount;

const COLUMNS: &str = "id, email, hashed_password, created_at, updated_at, last_sign_in_at";

pub(crate) async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AuthAccount>, sqlx::Error> {
    sqlx::query_as::<_, AuthAccount>(&format!(
        "SELECT {COLUMNS} FROM auth_accounts WHERE lower(email) = lower($1)"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn exists_by_email(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM auth_accounts WHERE lower(email) = lower($1))",
    )
    .bind(email)
    .fetch_one(pool)
    .await
}

pub(crate) struct CreateAccount<'a> {
    pub(crate) id: &'a str,
    pub(crate) email: &'a str,
    pub(crate) hashed_password: String,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAccount<'_>,
) -> Result<AuthAccount, sqlx::Error> {
    sqlx::query_as::<_, AuthAccount>(&format!(
        "INSERT INTO auth_accounts (id, email, hashed_password, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update_password(
    pool: &PgPool,
    id: &str,
    hashed_password: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE auth_accounts SET hashed_password = $1, updated_at = $2 WHERE id = $3",
    )
    .bind(hashed_password)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn touch_sign_in(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE auth_accounts SET last_sign_in_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Removes the account; its profile goes with it through the foreign key cascade.
pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM auth_accounts WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
