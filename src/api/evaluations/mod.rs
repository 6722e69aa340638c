mod grading;
mod handlers;
mod helpers;
mod intake;
mod review;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_evaluation).get(handlers::list_evaluations))
        .route("/:evaluation_id", get(handlers::get_evaluation))
        .route("/:evaluation_id/question-paper", post(intake::upload_question_paper))
        .route(
            "/:evaluation_id/answer-sheets",
            post(intake::upload_answer_sheets).get(intake::list_answer_sheets),
        )
        .route("/:evaluation_id/grade", post(grading::grade_evaluation))
        .route("/:evaluation_id/approve-all", post(review::approve_all))
        .route("/:evaluation_id/finalize", post(review::finalize))
        .route("/:evaluation_id/records/:record_id/approve", post(review::approve_record))
        .route("/:evaluation_id/records/:record_id/revise", post(review::revise_record))
        .route("/:evaluation_id/records/:record_id/undo", post(review::undo_record))
        .route(
            "/:evaluation_id/records/:record_id/questions/:question_number",
            patch(review::edit_question),
        )
}

#[cfg(test)]
mod tests;
