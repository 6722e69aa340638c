use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{EvaluationMode, EvaluationStatus, NotificationKind, ReviewStatus, UserRole};
use crate::services::evaluation_review::QuestionResult;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AuthAccount {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) last_sign_in_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Profile {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) display_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct EvaluationSessionRow {
    pub(crate) id: String,
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    pub(crate) mode: EvaluationMode,
    pub(crate) total_marks: f64,
    pub(crate) status: EvaluationStatus,
    pub(crate) question_paper_filename: Option<String>,
    pub(crate) question_paper_mime: Option<String>,
    pub(crate) question_paper_size: Option<i64>,
    pub(crate) question_paper_sha256: Option<String>,
    pub(crate) grading_progress: i32,
    pub(crate) version: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) finalized_at: Option<PrimitiveDateTime>,
    pub(crate) finalized_by: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AnswerSheet {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
    pub(crate) order_index: i32,
    pub(crate) graded: bool,
    pub(crate) uploaded_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct EvaluationRecordRow {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) sheet_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) total_marks: f64,
    pub(crate) score: f64,
    pub(crate) status: ReviewStatus,
    pub(crate) breakdown: Json<Vec<QuestionResult>>,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Notification {
    pub(crate) id: String,
    pub(crate) user_id: String,
    #[sqlx(rename = "type")]
    pub(crate) kind: NotificationKind,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) read: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) action_url: Option<String>,
    pub(crate) metadata: Json<serde_json::Value>,
}
