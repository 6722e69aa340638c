use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::core::security::{self, SecurityError};
use crate::core::time::primitive_now_utc;
use crate::db::models::Profile;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::auth_accounts::CreateAccount;
use crate::repositories::profiles::CreateProfile;
use crate::schemas::user::{BulkFailure, BulkResult, NewUserPayload};

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const MAX_BULK_USERS: usize = 500;
const DISPLAY_NAME_CHARS: std::ops::RangeInclusive<usize> = 2..=100;

#[derive(Debug, Error)]
pub(crate) enum UserAdminError {
    #[error("{0}")]
    Invalid(String),
    #[error("A user with email {0} already exists")]
    Duplicate(String),
    #[error("User not found")]
    NotFound,
    #[error("Administrators cannot delete their own account")]
    SelfDelete,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Security(#[from] SecurityError),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidatedUser {
    pub(crate) email: String,
    pub(crate) display_name: String,
    pub(crate) role: UserRole,
    pub(crate) password: String,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<(), UserAdminError> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(UserAdminError::Invalid(format!("Invalid email address: {email}")))
    }
}

pub(crate) fn validate_display_name(name: &str) -> Result<(), UserAdminError> {
    if DISPLAY_NAME_CHARS.contains(&name.chars().count()) {
        Ok(())
    } else {
        Err(UserAdminError::Invalid("Display name must be 2..100 characters".to_string()))
    }
}

pub(crate) fn validate_password_strength(password: &str) -> Result<(), UserAdminError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let upper = password.chars().any(|c| c.is_uppercase());
    let lower = password.chars().any(|c| c.is_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && upper && lower && digit {
        Ok(())
    } else {
        Err(UserAdminError::Invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters and contain upper-case, lower-case and digit characters"
        )))
    }
}

pub(crate) fn validate_new_user(payload: &NewUserPayload) -> Result<ValidatedUser, UserAdminError> {
    let email = normalize_email(&payload.email);
    validate_email(&email)?;
    let display_name = payload.display_name.trim().to_string();
    validate_display_name(&display_name)?;
    validate_password_strength(&payload.password)?;

    Ok(ValidatedUser { email, display_name, role: payload.role, password: payload.password.clone() })
}

/// Creates the login account first, then the profile. A failed profile insert removes
/// the account again so no credentials exist without a profile.
pub(crate) async fn create_user(
    pool: &PgPool,
    payload: &NewUserPayload,
) -> Result<Profile, UserAdminError> {
    let user = validate_new_user(payload)?;

    if repositories::auth_accounts::exists_by_email(pool, &user.email).await? {
        return Err(UserAdminError::Duplicate(user.email));
    }

    let hashed_password = security::hash_password(&user.password)?;
    let id = Uuid::new_v4().to_string();
    let now = primitive_now_utc();

    repositories::auth_accounts::create(
        pool,
        CreateAccount { id: &id, email: &user.email, hashed_password, now },
    )
    .await
    .map_err(|err| duplicate_or_database(err, &user.email))?;

    let profile = repositories::profiles::create(
        pool,
        CreateProfile {
            id: &id,
            email: &user.email,
            display_name: &user.display_name,
            role: user.role,
            now,
        },
    )
    .await;

    match profile {
        Ok(profile) => Ok(profile),
        Err(err) => {
            match repositories::auth_accounts::delete(pool, &id).await {
                Ok(_) => tracing::warn!(
                    error = %err,
                    account_id = %id,
                    "Profile creation failed; auth account rolled back"
                ),
                Err(cleanup) => tracing::error!(
                    error = %err,
                    cleanup_error = %cleanup,
                    account_id = %id,
                    email = %user.email,
                    "Profile creation failed and auth account cleanup failed; orphaned account left behind"
                ),
            }
            Err(duplicate_or_database(err, &user.email))
        }
    }
}

pub(crate) async fn reset_password(
    pool: &PgPool,
    user_id: &str,
    new_password: &str,
) -> Result<(), UserAdminError> {
    validate_password_strength(new_password)?;
    let hashed = security::hash_password(new_password)?;

    let updated =
        repositories::auth_accounts::update_password(pool, user_id, &hashed, primitive_now_utc())
            .await?;
    if updated {
        Ok(())
    } else {
        Err(UserAdminError::NotFound)
    }
}

pub(crate) async fn delete_user(
    pool: &PgPool,
    actor_id: &str,
    user_id: &str,
) -> Result<(), UserAdminError> {
    if actor_id == user_id {
        return Err(UserAdminError::SelfDelete);
    }

    if repositories::auth_accounts::delete(pool, user_id).await? {
        Ok(())
    } else {
        Err(UserAdminError::NotFound)
    }
}

#[derive(Debug, Default)]
pub(crate) struct BulkOutcome {
    pub(crate) created: Vec<Profile>,
    pub(crate) failed: Vec<BulkFailure>,
    pub(crate) results: Vec<BulkResult>,
}

/// Creates users one by one; a failed entry, including a database failure, is reported
/// and does not stop the rest.
pub(crate) async fn bulk_create(
    pool: &PgPool,
    users: &[NewUserPayload],
) -> Result<BulkOutcome, UserAdminError> {
    if users.is_empty() {
        return Err(UserAdminError::Invalid("users must not be empty".to_string()));
    }
    if users.len() > MAX_BULK_USERS {
        return Err(UserAdminError::Invalid(format!(
            "At most {MAX_BULK_USERS} users can be created at once"
        )));
    }

    let mut outcome = BulkOutcome::default();
    for (index, payload) in users.iter().enumerate() {
        match create_user(pool, payload).await {
            Ok(profile) => {
                outcome.results.push(BulkResult {
                    email: profile.email.clone(),
                    success: true,
                    user_id: Some(profile.id.clone()),
                    error: None,
                });
                outcome.created.push(profile);
            }
            Err(err) => {
                let error = match err {
                    UserAdminError::Database(db_err) => {
                        tracing::error!(
                            error = %db_err,
                            index,
                            email = %payload.email,
                            "Bulk user creation failed on database write"
                        );
                        "Failed to create user".to_string()
                    }
                    other => other.to_string(),
                };
                outcome.results.push(BulkResult {
                    email: payload.email.clone(),
                    success: false,
                    user_id: None,
                    error: Some(error.clone()),
                });
                outcome.failed.push(BulkFailure { index, email: payload.email.clone(), error });
            }
        }
    }
    Ok(outcome)
}

fn duplicate_or_database(err: sqlx::Error, email: &str) -> UserAdminError {
    let unique_violation = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == "23505");
    if unique_violation {
        UserAdminError::Duplicate(email.to_string())
    } else {
        UserAdminError::Database(err)
    }
}
