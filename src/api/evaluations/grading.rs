use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::EvaluationStatus;
use crate::repositories;
use crate::repositories::evaluations::SheetForGrading;
use crate::schemas::evaluation::{EvaluationResponse, GradeRunResponse, GradingFailure};
use crate::services::evaluation_review::EvaluationRecord;
use crate::services::grading::{
    GradeRequest, QuestionPaper, QuestionTemplate, DEFAULT_QUESTION_COUNT,
};

use super::helpers::{load_header, load_session};

/// Grades every sheet that has no record yet. A failing sheet is reported and skipped so
/// the rest of the batch still lands; grading again later picks up only what is missing.
pub(super) async fn grade_evaluation(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<GradeRunResponse>, ApiError> {
    let header = load_header(&state, &user, &evaluation_id).await?;
    if header.status == EvaluationStatus::Finalized {
        return Err(ApiError::Conflict("Evaluation is finalized".to_string()));
    }

    let sheet_count = repositories::evaluations::count_sheets(state.db(), &header.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count answer sheets"))?;
    if sheet_count == 0 {
        return Err(ApiError::BadRequest("Upload at least one answer sheet first".to_string()));
    }

    let pending = repositories::evaluations::list_ungraded_sheets(state.db(), &header.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answer sheets"))?;
    if pending.is_empty() {
        return Err(ApiError::Conflict("All answer sheets are already graded".to_string()));
    }

    let question_paper = repositories::evaluations::fetch_question_paper(state.db(), &header.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question paper"))?
        .map(|paper| QuestionPaper {
            filename: paper.filename,
            mime_type: paper.mime_type,
            content: paper.content,
        });
    let template = QuestionTemplate::split_evenly(header.total_marks, DEFAULT_QUESTION_COUNT);
    let grader = state.grader();

    tracing::info!(
        evaluation_id = %header.id,
        grader = grader.name(),
        sheets = pending.len(),
        "Grading started"
    );

    let total = pending.len();
    let mut graded = 0usize;
    let mut failed = Vec::new();

    for (index, sheet) in pending.into_iter().enumerate() {
        let SheetForGrading { id, student_name, roll_number, filename, mime_type, content } = sheet;
        let request = GradeRequest {
            sheet_id: id.clone(),
            student_name,
            roll_number,
            filename: filename.clone(),
            mime_type,
            content,
            evaluation_title: header.title.clone(),
            template: template.clone(),
            question_paper: question_paper.clone(),
        };

        match grader.grade(&request).await {
            Ok(outcome) => {
                let record = EvaluationRecord::graded(
                    Uuid::new_v4().to_string(),
                    request.sheet_id,
                    request.student_name,
                    request.roll_number,
                    header.total_marks,
                    outcome.into_breakdown(),
                    primitive_now_utc(),
                );
                let stored = repositories::evaluations::record_graded(state.db(), &header.id, &record)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to store grading result"))?;
                if stored {
                    graded += 1;
                } else {
                    tracing::info!(sheet_id = %id, "Sheet was graded by a concurrent run; skipping");
                }
            }
            Err(err) => {
                tracing::warn!(
                    evaluation_id = %header.id,
                    sheet_id = %id,
                    error = %err,
                    "Grading failed for answer sheet"
                );
                failed.push(GradingFailure { sheet_id: id, filename, error: err.to_string() });
            }
        }

        let progress = (((index + 1) * 100) / total) as i32;
        repositories::evaluations::update_progress(state.db(), &header.id, progress, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to record grading progress"))?;
    }

    if graded > 0 {
        repositories::evaluations::mark_in_review(state.db(), &header.id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to open evaluation for review"))?;
    }

    tracing::info!(
        evaluation_id = %header.id,
        graded,
        failed = failed.len(),
        "Grading finished"
    );

    let session = load_session(&state, &user, &evaluation_id).await?;
    Ok(Json(GradeRunResponse {
        grader: grader.name().to_string(),
        graded,
        failed,
        evaluation: EvaluationResponse::from_session(&session),
    }))
}
