use sqlx::PgPool;

use crate::db::models::{AnswerSheet, EvaluationRecordRow, EvaluationSessionRow};
use crate::db::types::{EvaluationStatus, ReviewStatus};
use crate::services::evaluation_review::EvaluationSession;

use super::types::{
    EvaluationListRow, SheetForGrading, StoredQuestionPaper, RECORD_COLUMNS, SESSION_COLUMNS,
    SHEET_COLUMNS,
};

pub(crate) async fn find_session(
    pool: &PgPool,
    id: &str,
) -> Result<Option<EvaluationSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM evaluation_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Session header plus its records in upload order.
pub(crate) async fn load_aggregate(
    pool: &PgPool,
    id: &str,
) -> Result<Option<EvaluationSession>, sqlx::Error> {
    let Some(header) = find_session(pool, id).await? else {
        return Ok(None);
    };

    let records = sqlx::query_as::<_, EvaluationRecordRow>(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM evaluation_records r
         JOIN answer_sheets s ON s.id = r.sheet_id
         WHERE r.session_id = $1
         ORDER BY s.order_index"
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(EvaluationSession::from_rows(header, records)))
}

pub(crate) async fn list_sessions(
    pool: &PgPool,
    teacher_id: Option<&str>,
    skip: i64,
    limit: i64,
) -> Result<Vec<EvaluationListRow>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationListRow>(
        "SELECT e.id, e.teacher_id, e.title, e.mode, e.status, e.total_marks, e.grading_progress,
                e.created_at, e.updated_at,
                (SELECT COUNT(*) FROM answer_sheets s WHERE s.session_id = e.id) AS sheet_count,
                (SELECT COUNT(*) FROM evaluation_records r WHERE r.session_id = e.id) AS record_count,
                (SELECT COUNT(*) FROM evaluation_records r
                  WHERE r.session_id = e.id AND r.status = $2) AS approved_count
         FROM evaluation_sessions e
         WHERE ($1::text IS NULL OR e.teacher_id = $1)
         ORDER BY e.created_at DESC, e.id
         OFFSET $3 LIMIT $4",
    )
    .bind(teacher_id)
    .bind(ReviewStatus::Approved)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_sheets(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<AnswerSheet>, sqlx::Error> {
    sqlx::query_as::<_, AnswerSheet>(&format!(
        "SELECT {SHEET_COLUMNS} FROM answer_sheets WHERE session_id = $1 ORDER BY order_index"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_sheets(pool: &PgPool, session_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM answer_sheets WHERE session_id = $1")
        .bind(session_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_ungraded_sheets(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<SheetForGrading>, sqlx::Error> {
    sqlx::query_as::<_, SheetForGrading>(
        "SELECT id, student_name, roll_number, filename, mime_type, content
         FROM answer_sheets
         WHERE session_id = $1 AND graded = FALSE
         ORDER BY order_index",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn fetch_question_paper(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<StoredQuestionPaper>, sqlx::Error> {
    sqlx::query_as::<_, StoredQuestionPaper>(
        "SELECT question_paper_filename AS filename,
                question_paper_mime AS mime_type,
                question_paper_content AS content
         FROM evaluation_sessions
         WHERE id = $1 AND question_paper_content IS NOT NULL",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

/// Evaluation counts per status, optionally limited to one teacher.
pub(crate) async fn status_counts(
    pool: &PgPool,
    teacher_id: Option<&str>,
) -> Result<Vec<(EvaluationStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (EvaluationStatus, i64)>(
        "SELECT status, COUNT(*)
         FROM evaluation_sessions
         WHERE ($1::text IS NULL OR teacher_id = $1)
         GROUP BY status",
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn pending_records_for_teacher(
    pool: &PgPool,
    teacher_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM evaluation_records r
         JOIN evaluation_sessions e ON e.id = r.session_id
         WHERE e.teacher_id = $1 AND e.status = $2 AND r.status <> $3",
    )
    .bind(teacher_id)
    .bind(EvaluationStatus::InReview)
    .bind(ReviewStatus::Approved)
    .fetch_one(pool)
    .await
}

pub(crate) async fn finalized_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM evaluation_sessions WHERE status = $1")
        .bind(EvaluationStatus::Finalized)
        .fetch_one(pool)
        .await
}
