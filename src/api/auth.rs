use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::session_cookie::{build_session_cookie, clear_session_cookie};
use crate::core::redis::login_rate_key;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, SessionResponse};
use crate::schemas::user::UserResponse;
use crate::services::access_policy::home_path;
use crate::services::user_admin::normalize_email;

/// Max login attempts per email inside one window.
const LOGIN_RATE_LIMIT: u64 = 10;
const LOGIN_RATE_WINDOW_SECONDS: u64 = 60;
const INVALID_CREDENTIALS: &str = "Incorrect email or password";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }

    let allowed = state
        .redis()
        .rate_limit(&login_rate_key(&email), LOGIN_RATE_LIMIT, LOGIN_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Login rate limit check failed; allowing request");
            true
        });
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let account = repositories::auth_accounts::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load account"))?
        .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;

    let verified = security::verify_password(&payload.password, &account.hashed_password)
        .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS))?;
    if !verified {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    let profile = repositories::profiles::find_by_id(state.db(), &account.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load profile"))?
        .ok_or_else(|| {
            tracing::error!(account_id = %account.id, "Auth account has no profile");
            ApiError::Unauthorized(INVALID_CREDENTIALS)
        })?;

    if !profile.is_active {
        return Err(ApiError::Forbidden("Account is disabled"));
    }

    if let Err(err) =
        repositories::auth_accounts::touch_sign_in(state.db(), &account.id, primitive_now_utc()).await
    {
        tracing::warn!(error = %err, account_id = %account.id, "Failed to record sign-in time");
    }

    let lifetime = security::session_lifetime(state.settings());
    let token = security::create_session_token(&profile.id, state.settings(), Some(lifetime))
        .map_err(|e| ApiError::internal(e, "Failed to create session token"))?;
    let cookie = build_session_cookie(
        &token,
        lifetime.whole_seconds(),
        state.settings().security().session_cookie_secure,
    );

    tracing::info!(user_id = %profile.id, role = profile.role.as_str(), "User signed in");

    let response = SessionResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        redirect_to: home_path(profile.role).to_string(),
        user: UserResponse::from_profile(profile),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(response)).into_response())
}

async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(state.settings().security().session_cookie_secure);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response()
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_profile(user))
}
