use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, CurrentUser};
use crate::api::pagination;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::db::types::NotificationKind;
use crate::repositories;
use crate::schemas::user::{
    AdminUserAction, BulkCreateResponse, CreatedUserResponse, UserListQuery, UserListResponse,
    UserResponse,
};
use crate::services::access_policy::{can_manage_users, home_path};
use crate::services::notifications::{self, Outgoing};
use crate::services::user_admin;

const ADMIN_ONLY: &str = "Only administrators can manage users";

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_users).post(handle_action))
}

async fn list_users(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    require_role(&user, can_manage_users, ADMIN_ONLY)?;
    let (skip, limit) = pagination::window(params.skip, params.limit);

    let profiles = repositories::profiles::list(state.db(), params.role, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total = repositories::profiles::count(state.db(), params.role)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    Ok(Json(UserListResponse {
        items: profiles.into_iter().map(UserResponse::from_profile).collect(),
        total,
        skip,
        limit,
    }))
}

async fn handle_action(
    CurrentUser(admin): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    require_role(&admin, can_manage_users, ADMIN_ONLY)?;

    let action: AdminUserAction = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid action payload: {e}")))?;
    let action_name = action.name();

    let result = run_action(&state, &admin, action).await;
    let outcome = if result.is_ok() { "success" } else { "failure" };
    metrics::record_admin_action(action_name, outcome);
    tracing::info!(admin_id = %admin.id, action = action_name, outcome, "Admin user action");

    result
}

async fn run_action(
    state: &AppState,
    admin: &Profile,
    action: AdminUserAction,
) -> Result<Response, ApiError> {
    match action {
        AdminUserAction::Create(payload) => {
            let profile = user_admin::create_user(state.db(), &payload).await?;
            send_welcome(state, &profile).await;
            let body =
                CreatedUserResponse { success: true, user: UserResponse::from_profile(profile) };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        AdminUserAction::ResetPassword { user_id, new_password } => {
            user_admin::reset_password(state.db(), &user_id, &new_password).await?;
            Ok(Json(json!({"success": true, "user_id": user_id})).into_response())
        }
        AdminUserAction::DeleteAuth { user_id } => {
            user_admin::delete_user(state.db(), &admin.id, &user_id).await?;
            Ok(Json(json!({"success": true, "user_id": user_id})).into_response())
        }
        AdminUserAction::BulkCreate { users } => {
            let outcome = user_admin::bulk_create(state.db(), &users).await?;
            for profile in &outcome.created {
                send_welcome(state, profile).await;
            }
            Ok(Json(BulkCreateResponse {
                success: true,
                results: outcome.results,
                created: outcome.created.into_iter().map(UserResponse::from_profile).collect(),
                failed: outcome.failed,
            })
            .into_response())
        }
    }
}

async fn send_welcome(state: &AppState, profile: &Profile) {
    let outgoing = Outgoing::new(
        NotificationKind::Info,
        "Welcome to EduBoard",
        format!("Your {} account is ready.", profile.role.as_str()),
    )
    .with_action_url(home_path(profile.role));
    notifications::notify_quietly(state, &profile.id, &outgoing).await;
}
