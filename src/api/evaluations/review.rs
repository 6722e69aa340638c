use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Profile;
use crate::db::types::NotificationKind;
use crate::repositories;
use crate::schemas::evaluation::{
    ApproveAllResponse, EvaluationResponse, FinalizeRequest, QuestionEditRequest,
};
use crate::services::evaluation_review::{
    EvaluationSession, QuestionEdit, ReviewAction, ReviewError,
};
use crate::services::notifications::{self, Outgoing};

use super::helpers::load_session;

const CONCURRENT_CHANGE: &str = "Evaluation was modified concurrently; reload and try again";

/// Loads the aggregate, applies one change in memory and commits it against the version
/// that was read. Returns the reloaded session and whatever the change produced.
async fn apply_review<T>(
    state: &AppState,
    user: &Profile,
    evaluation_id: &str,
    change: impl FnOnce(&mut EvaluationSession, PrimitiveDateTime) -> Result<T, ReviewError>,
) -> Result<(EvaluationSession, T), ApiError> {
    let mut session = load_session(state, user, evaluation_id).await?;
    let now = primitive_now_utc();
    let produced = change(&mut session, now)?;

    let saved = repositories::evaluations::save_review(state.db(), &session, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save review"))?;
    if !saved {
        tracing::info!(evaluation_id, version = session.version(), "Stale review write rejected");
        return Err(ApiError::Conflict(CONCURRENT_CHANGE.to_string()));
    }

    let session = load_session(state, user, evaluation_id).await?;
    Ok((session, produced))
}

async fn transition_record(
    state: AppState,
    user: Profile,
    evaluation_id: String,
    record_id: String,
    action: ReviewAction,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let (session, ()) = apply_review(&state, &user, &evaluation_id, |session, now| {
        session.transition(&record_id, action, &user.id, now)
    })
    .await?;

    metrics::record_transition(action.as_str(), 1);
    tracing::info!(
        evaluation_id = %evaluation_id,
        record_id = %record_id,
        action = action.as_str(),
        reviewer = %user.id,
        "Record review updated"
    );
    Ok(Json(EvaluationResponse::from_session(&session)))
}

pub(super) async fn approve_record(
    Path((evaluation_id, record_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    transition_record(state, user, evaluation_id, record_id, ReviewAction::Approve).await
}

pub(super) async fn revise_record(
    Path((evaluation_id, record_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    transition_record(state, user, evaluation_id, record_id, ReviewAction::Revise).await
}

pub(super) async fn undo_record(
    Path((evaluation_id, record_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    transition_record(state, user, evaluation_id, record_id, ReviewAction::Undo).await
}

pub(super) async fn approve_all(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApproveAllResponse>, ApiError> {
    let (session, approved) = apply_review(&state, &user, &evaluation_id, |session, now| {
        session.approve_all(&user.id, now)
    })
    .await?;

    metrics::record_transition("approve_all", approved as u64);
    tracing::info!(evaluation_id = %evaluation_id, approved, reviewer = %user.id, "Approved all records");
    Ok(Json(ApproveAllResponse { approved, evaluation: EvaluationResponse::from_session(&session) }))
}

pub(super) async fn edit_question(
    Path((evaluation_id, record_id, question_number)): Path<(String, String, i32)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionEditRequest>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    if payload.marks.is_none() && payload.comment.is_none() && !payload.clear_adjustment {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    let edit = QuestionEdit {
        marks: payload.marks,
        comment: payload.comment,
        clear_adjustment: payload.clear_adjustment,
    };

    let (session, ()) = apply_review(&state, &user, &evaluation_id, |session, now| {
        session.edit_question(&record_id, question_number, edit, now)
    })
    .await?;

    tracing::info!(
        evaluation_id = %evaluation_id,
        record_id = %record_id,
        question_number,
        reviewer = %user.id,
        "Question marks edited"
    );
    Ok(Json(EvaluationResponse::from_session(&session)))
}

pub(super) async fn finalize(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<FinalizeRequest>>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let confirm = payload.map(|Json(body)| body.confirm_unreviewed).unwrap_or(false);

    let (session, summary) = apply_review(&state, &user, &evaluation_id, |session, now| {
        session.finalize(confirm, &user.id, now)
    })
    .await?;

    metrics::record_finalized();
    tracing::info!(
        evaluation_id = %evaluation_id,
        finalized_by = %user.id,
        approved = summary.approved,
        total = summary.total,
        "Evaluation finalized"
    );

    let header = session.header();
    let outgoing = Outgoing::new(
        NotificationKind::Evaluation,
        header.title.clone(),
        format!("Evaluation finalized: {} approved", summary.progress_label),
    )
    .with_action_url(format!("/evaluations/{}", header.id))
    .with_metadata(json!({
        "evaluation_id": header.id,
        "title": header.title,
        "approved": summary.approved,
        "total": summary.total,
    }));
    notifications::notify_quietly(&state, &header.teacher_id, &outgoing).await;

    Ok(Json(EvaluationResponse::from_session(&session)))
}
