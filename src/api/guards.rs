use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::api::errors::ApiError;
use crate::api::session_cookie::{bearer_token, read_session_cookie};
use crate::core::{security, state::AppState};
use crate::db::models::Profile;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) const LOGIN_PATH: &str = "/login";

/// Signed-in user for API routes; rejects with 401.
pub(crate) struct CurrentUser(pub(crate) Profile);

/// Signed-in user for page routes; rejects by redirecting to the login page.
pub(crate) struct PageUser(pub(crate) Profile);

enum AuthFailure {
    Unauthenticated(&'static str),
    Backend(ApiError),
}

/// Cookie first, then bearer header.
async fn authenticate(parts: &Parts, state: &AppState) -> Result<Profile, AuthFailure> {
    let token = read_session_cookie(&parts.headers)
        .or_else(|| bearer_token(&parts.headers))
        .ok_or(AuthFailure::Unauthenticated("Not authenticated"))?;

    let claims = security::verify_session_token(&token, state.settings())
        .map_err(|_| AuthFailure::Unauthenticated("Invalid authentication credentials"))?;

    let profile = repositories::profiles::find_by_id(state.db(), &claims.sub)
        .await
        .map_err(|e| AuthFailure::Backend(ApiError::internal(e, "Failed to load user")))?;

    match profile {
        Some(profile) if profile.is_active => Ok(profile),
        Some(_) => Err(AuthFailure::Unauthenticated("Invalid authentication credentials")),
        None => Err(AuthFailure::Unauthenticated("User not found")),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(profile) => Ok(CurrentUser(profile)),
            Err(AuthFailure::Unauthenticated(message)) => Err(ApiError::Unauthorized(message)),
            Err(AuthFailure::Backend(err)) => Err(err),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for PageUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(profile) => Ok(PageUser(profile)),
            Err(AuthFailure::Unauthenticated(_)) => Err(Redirect::to(LOGIN_PATH).into_response()),
            Err(AuthFailure::Backend(err)) => Err(err.into_response()),
        }
    }
}

pub(crate) fn require_role(
    user: &Profile,
    allowed: fn(UserRole) -> bool,
    message: &'static str,
) -> Result<(), ApiError> {
    if allowed(user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(message))
    }
}
