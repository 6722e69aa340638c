use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{AnswerSheet, EvaluationSessionRow};
use crate::db::types::{EvaluationMode, EvaluationStatus};
use crate::services::answer_sheets::PreparedSheet;
use crate::services::evaluation_review::{EvaluationRecord, EvaluationSession};

use super::types::{NewEvaluation, SheetInsert, SESSION_COLUMNS, SHEET_COLUMNS};

pub(crate) async fn create_session(
    pool: &PgPool,
    params: NewEvaluation<'_>,
) -> Result<EvaluationSessionRow, sqlx::Error> {
    sqlx::query_as::<_, EvaluationSessionRow>(&format!(
        "INSERT INTO evaluation_sessions (
            id, teacher_id, title, mode, total_marks, status, grading_progress, version,
            created_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, 0, 0, $7, $7)
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.teacher_id)
    .bind(params.title)
    .bind(params.mode)
    .bind(params.total_marks)
    .bind(EvaluationStatus::Draft)
    .bind(params.now)
    .fetch_one(pool)
    .await
}

/// Stores the question paper while the evaluation is still a draft.
pub(crate) async fn set_question_paper(
    pool: &PgPool,
    session_id: &str,
    sheet: &PreparedSheet,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE evaluation_sessions
         SET question_paper_filename = $1,
             question_paper_mime = $2,
             question_paper_size = $3,
             question_paper_sha256 = $4,
             question_paper_content = $5,
             updated_at = $6
         WHERE id = $7 AND status = $8",
    )
    .bind(&sheet.filename)
    .bind(&sheet.mime_type)
    .bind(sheet.bytes.len() as i64)
    .bind(&sheet.sha256)
    .bind(&sheet.bytes)
    .bind(now)
    .bind(session_id)
    .bind(EvaluationStatus::Draft)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Appends sheets under a row lock so the per-evaluation limit holds across concurrent uploads.
pub(crate) async fn insert_sheets(
    pool: &PgPool,
    session_id: &str,
    sheets: &[PreparedSheet],
    max_bulk_sheets: i64,
    now: PrimitiveDateTime,
) -> Result<SheetInsert, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (status, mode): (EvaluationStatus, EvaluationMode) = sqlx::query_as(
        "SELECT status, mode FROM evaluation_sessions WHERE id = $1 FOR UPDATE",
    )
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await?;

    if status != EvaluationStatus::Draft {
        tx.rollback().await?;
        return Ok(SheetInsert::NotDraft);
    }

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM answer_sheets WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;

    let limit = match mode {
        EvaluationMode::Single => 1,
        EvaluationMode::Bulk => max_bulk_sheets,
    };
    if existing + sheets.len() as i64 > limit {
        tx.rollback().await?;
        return Ok(SheetInsert::LimitExceeded { existing, limit });
    }

    let mut inserted = Vec::with_capacity(sheets.len());
    for (offset, sheet) in sheets.iter().enumerate() {
        let row = sqlx::query_as::<_, AnswerSheet>(&format!(
            "INSERT INTO answer_sheets (
                id, session_id, student_name, roll_number, filename, mime_type, file_size,
                sha256, content, order_index, graded, uploaded_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11)
             RETURNING {SHEET_COLUMNS}"
        ))
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(session_id)
        .bind(&sheet.student_name)
        .bind(&sheet.roll_number)
        .bind(&sheet.filename)
        .bind(&sheet.mime_type)
        .bind(sheet.bytes.len() as i64)
        .bind(&sheet.sha256)
        .bind(&sheet.bytes)
        .bind((existing + offset as i64) as i32)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        inserted.push(row);
    }

    sqlx::query("UPDATE evaluation_sessions SET updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(SheetInsert::Inserted(inserted))
}

/// Claims the sheet and stores its record atomically. `false` if another run graded it first.
pub(crate) async fn record_graded(
    pool: &PgPool,
    session_id: &str,
    record: &EvaluationRecord,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        "UPDATE answer_sheets SET graded = TRUE
         WHERE id = $1 AND session_id = $2 AND graded = FALSE",
    )
    .bind(record.sheet_id())
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO evaluation_records (
            id, session_id, sheet_id, student_name, roll_number, total_marks, score, status,
            breakdown, reviewed_by, reviewed_at, created_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, NULL, $10, $11)",
    )
    .bind(record.id())
    .bind(session_id)
    .bind(record.sheet_id())
    .bind(record.student_name())
    .bind(record.roll_number())
    .bind(record.total_marks())
    .bind(record.score())
    .bind(record.status())
    .bind(Json(record.breakdown()))
    .bind(record.created_at())
    .bind(record.updated_at())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub(crate) async fn update_progress(
    pool: &PgPool,
    session_id: &str,
    progress: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE evaluation_sessions SET grading_progress = $1, updated_at = $2 WHERE id = $3",
    )
    .bind(progress.clamp(0, 100))
    .bind(now)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn mark_in_review(
    pool: &PgPool,
    session_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE evaluation_sessions
         SET status = $1, version = version + 1, updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(EvaluationStatus::InReview)
    .bind(now)
    .bind(session_id)
    .bind(EvaluationStatus::Draft)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Commits a reviewed aggregate if nobody changed the evaluation since it was loaded.
/// Returns `false` on a version mismatch and leaves the stored state untouched.
pub(crate) async fn save_review(
    pool: &PgPool,
    session: &EvaluationSession,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    if !session.is_header_dirty() && session.dirty_records().next().is_none() {
        return Ok(true);
    }

    let mut tx = pool.begin().await?;
    let header = session.header();

    let bumped = sqlx::query(
        "UPDATE evaluation_sessions
         SET version = version + 1,
             status = $1,
             finalized_at = $2,
             finalized_by = $3,
             updated_at = $4
         WHERE id = $5 AND version = $6",
    )
    .bind(header.status)
    .bind(header.finalized_at)
    .bind(&header.finalized_by)
    .bind(now)
    .bind(session.id())
    .bind(header.version)
    .execute(&mut *tx)
    .await?;

    if bumped.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    for record in session.dirty_records() {
        sqlx::query(
            "UPDATE evaluation_records
             SET score = $1,
                 status = $2,
                 breakdown = $3,
                 reviewed_by = $4,
                 reviewed_at = $5,
                 updated_at = $6
             WHERE id = $7 AND session_id = $8",
        )
        .bind(record.score())
        .bind(record.status())
        .bind(Json(record.breakdown()))
        .bind(record.reviewed_by())
        .bind(record.reviewed_at())
        .bind(record.updated_at())
        .bind(record.id())
        .bind(session.id())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}
