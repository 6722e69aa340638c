use axum::extract::multipart::Field;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::{EvaluationSessionRow, Profile};
use crate::repositories;
use crate::services::access_policy::{can_access_evaluation, can_evaluate};
use crate::services::evaluation_review::EvaluationSession;

pub(super) const EVALUATORS_ONLY: &str = "Only teachers can manage evaluations";

pub(super) fn ensure_evaluator(user: &Profile) -> Result<(), ApiError> {
    crate::api::guards::require_role(user, can_evaluate, EVALUATORS_ONLY)
}

fn ensure_access(user: &Profile, owner_id: &str) -> Result<(), ApiError> {
    if can_access_evaluation(user.role, &user.id, owner_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Access denied"))
    }
}

pub(super) async fn load_header(
    state: &AppState,
    user: &Profile,
    evaluation_id: &str,
) -> Result<EvaluationSessionRow, ApiError> {
    ensure_evaluator(user)?;
    let header = repositories::evaluations::find_session(state.db(), evaluation_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load evaluation"))?
        .ok_or_else(|| ApiError::NotFound("Evaluation not found".to_string()))?;
    ensure_access(user, &header.teacher_id)?;
    Ok(header)
}

pub(super) async fn load_session(
    state: &AppState,
    user: &Profile,
    evaluation_id: &str,
) -> Result<EvaluationSession, ApiError> {
    ensure_evaluator(user)?;
    let session = repositories::evaluations::load_aggregate(state.db(), evaluation_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load evaluation"))?
        .ok_or_else(|| ApiError::NotFound("Evaluation not found".to_string()))?;
    ensure_access(user, &session.header().teacher_id)?;
    Ok(session)
}

/// Reads one uploaded file while enforcing the per-file size limit.
pub(super) async fn read_file(field: &mut Field<'_>, max_bytes: u64) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
    {
        let next_size = bytes.len() as u64 + chunk.len() as u64;
        if next_size > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File size exceeds {}MB limit",
                max_bytes / 1024 / 1024
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
