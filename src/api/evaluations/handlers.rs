use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::evaluations::NewEvaluation;
use crate::schemas::evaluation::{
    EvaluationCreate, EvaluationListItem, EvaluationListQuery, EvaluationResponse,
};
use crate::services::evaluation_review::EvaluationSession;

use super::helpers::{ensure_evaluator, load_session};

pub(super) async fn create_evaluation(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<EvaluationCreate>,
) -> Result<(StatusCode, Json<EvaluationResponse>), ApiError> {
    ensure_evaluator(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = Uuid::new_v4().to_string();
    let header = repositories::evaluations::create_session(
        state.db(),
        NewEvaluation {
            id: &id,
            teacher_id: &user.id,
            title: &payload.title,
            mode: payload.mode,
            total_marks: payload.total_marks,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create evaluation"))?;

    tracing::info!(
        evaluation_id = %header.id,
        teacher_id = %user.id,
        mode = ?header.mode,
        "Evaluation created"
    );

    let session = EvaluationSession::from_rows(header, Vec::new());
    Ok((StatusCode::CREATED, Json(EvaluationResponse::from_session(&session))))
}

/// Teachers see their own evaluations; admin and dev see all of them.
pub(super) async fn list_evaluations(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<EvaluationListQuery>,
) -> Result<Json<Vec<EvaluationListItem>>, ApiError> {
    ensure_evaluator(&user)?;
    let (skip, limit) = pagination::window(params.skip, params.limit);

    let owner = match user.role {
        UserRole::Admin | UserRole::Dev => None,
        _ => Some(user.id.as_str()),
    };
    let rows = repositories::evaluations::list_sessions(state.db(), owner, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list evaluations"))?;

    Ok(Json(rows.into_iter().map(EvaluationListItem::from_row).collect()))
}

pub(super) async fn get_evaluation(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let session = load_session(&state, &user, &evaluation_id).await?;
    Ok(Json(EvaluationResponse::from_session(&session)))
}
