use time::PrimitiveDateTime;

use crate::db::models::AnswerSheet;
use crate::db::types::{EvaluationMode, EvaluationStatus};

pub(crate) const SESSION_COLUMNS: &str = "\
    id, teacher_id, title, mode, total_marks, status, question_paper_filename, \
    question_paper_mime, question_paper_size, question_paper_sha256, grading_progress, \
    version, created_at, updated_at, finalized_at, finalized_by";

pub(crate) const SHEET_COLUMNS: &str = "\
    id, session_id, student_name, roll_number, filename, mime_type, file_size, sha256, \
    order_index, graded, uploaded_at";

pub(crate) const RECORD_COLUMNS: &str = "\
    r.id, r.session_id, r.sheet_id, r.student_name, r.roll_number, r.total_marks, r.score, \
    r.status, r.breakdown, r.reviewed_by, r.reviewed_at, r.created_at, r.updated_at";

pub(crate) struct NewEvaluation<'a> {
    pub(crate) id: &'a str,
    pub(crate) teacher_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) mode: EvaluationMode,
    pub(crate) total_marks: f64,
    pub(crate) now: PrimitiveDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EvaluationListRow {
    pub(crate) id: String,
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    pub(crate) mode: EvaluationMode,
    pub(crate) status: EvaluationStatus,
    pub(crate) total_marks: f64,
    pub(crate) grading_progress: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) sheet_count: i64,
    pub(crate) record_count: i64,
    pub(crate) approved_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SheetForGrading {
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) content: Vec<u8>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StoredQuestionPaper {
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) content: Vec<u8>,
}

#[derive(Debug)]
pub(crate) enum SheetInsert {
    Inserted(Vec<AnswerSheet>),
    LimitExceeded { existing: i64, limit: i64 },
    NotDraft,
}
