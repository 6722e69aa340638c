use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::api::guards::{PageUser, LOGIN_PATH};
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::dashboard::{DashboardData, DashboardResponse, StatusCounts};
use crate::schemas::notification::NotificationResponse;
use crate::schemas::user::UserResponse;
use crate::services::access_policy::{authorize_dashboard, home_path, DashboardAccess};

const RECENT_NOTIFICATIONS: i64 = 5;

/// Browser-facing routes; unauthenticated visitors are sent to the login page.
pub(crate) fn router(api_prefix: &str) -> Router<AppState> {
    let login_url = format!("{api_prefix}/auth/login");
    Router::new()
        .route(
            LOGIN_PATH,
            get(move || {
                let login_url = login_url.clone();
                async move {
                    Json(json!({
                        "message": "Sign in with your email and password",
                        "login_url": login_url,
                    }))
                }
            }),
        )
        .route("/dashboard", get(dashboard_home))
        .route("/dashboard/:role", get(dashboard))
}

async fn dashboard_home(PageUser(user): PageUser) -> Redirect {
    Redirect::to(home_path(user.role))
}

async fn dashboard(
    Path(requested): Path<String>,
    PageUser(user): PageUser,
    State(state): State<AppState>,
) -> Response {
    let Some(requested) = UserRole::parse(&requested) else {
        return Redirect::to(home_path(user.role)).into_response();
    };
    if let DashboardAccess::Redirect(target) = authorize_dashboard(user.role, requested) {
        tracing::debug!(user_id = %user.id, requested = requested.as_str(), "Dashboard redirect");
        return Redirect::to(target).into_response();
    }

    let (data, degraded) = match load_dashboard(&state, &user, requested).await {
        Ok(data) => (data, false),
        Err(err) => {
            tracing::warn!(
                error = %err,
                user_id = %user.id,
                dashboard = requested.as_str(),
                "Dashboard data unavailable; serving empty view"
            );
            (DashboardData::empty(requested), true)
        }
    };

    Json(DashboardResponse {
        dashboard: requested,
        user: UserResponse::from_profile(user),
        degraded,
        data,
    })
    .into_response()
}

async fn load_dashboard(
    state: &AppState,
    user: &Profile,
    dashboard: UserRole,
) -> Result<DashboardData, sqlx::Error> {
    let db = state.db();
    let data = match dashboard {
        UserRole::Student => {
            let recent = repositories::notifications::list_for_user(
                db,
                &user.id,
                false,
                0,
                RECENT_NOTIFICATIONS,
            )
            .await?;
            DashboardData::Student {
                unread_notifications: repositories::notifications::count_unread(db, &user.id)
                    .await?,
                recent_notifications: recent.into_iter().map(NotificationResponse::from_db).collect(),
            }
        }
        UserRole::Teacher => {
            let counts = repositories::evaluations::status_counts(db, Some(&user.id)).await?;
            DashboardData::Teacher {
                evaluations: StatusCounts::from_rows(&counts),
                pending_reviews: repositories::evaluations::pending_records_for_teacher(db, &user.id)
                    .await?,
            }
        }
        UserRole::Admin => {
            let users_by_role = users_by_role(state).await?;
            DashboardData::Admin { total_users: users_by_role.values().sum(), users_by_role }
        }
        UserRole::Institution => {
            let counts = repositories::evaluations::status_counts(db, None).await?;
            DashboardData::Institution {
                users_by_role: users_by_role(state).await?,
                evaluations: StatusCounts::from_rows(&counts),
                finalized_evaluations: repositories::evaluations::finalized_count(db).await?,
            }
        }
        UserRole::Dev => DashboardData::Dev {
            dashboards: UserRole::ALL.iter().map(|role| home_path(*role).to_string()).collect(),
        },
    };
    Ok(data)
}

async fn users_by_role(state: &AppState) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows = repositories::profiles::count_by_role(state.db()).await?;
    Ok(rows.into_iter().map(|(role, count)| (role.as_str().to_string(), count)).collect())
}
