use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{AnswerSheet, EvaluationSessionRow};
use crate::db::types::{EvaluationMode, EvaluationStatus, ReviewStatus};
use crate::repositories::evaluations::EvaluationListRow;
use crate::services::evaluation_review::{
    EvaluationRecord, EvaluationSession, QuestionResult, ReviewSummary,
};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EvaluationCreate {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 200, message = "title must be 1..200 characters"))]
    pub(crate) title: String,
    #[serde(alias = "totalMarks")]
    #[validate(range(
        exclusive_min = 0.0,
        max = 1000.0,
        message = "total_marks must be greater than 0 and at most 1000"
    ))]
    pub(crate) total_marks: f64,
    #[serde(default = "default_mode")]
    pub(crate) mode: EvaluationMode,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| value.trim().to_string())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuestionEditRequest {
    #[serde(default)]
    pub(crate) marks: Option<f64>,
    #[serde(default)]
    pub(crate) comment: Option<String>,
    #[serde(default, alias = "clearAdjustment")]
    pub(crate) clear_adjustment: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FinalizeRequest {
    #[serde(default, alias = "confirmUnreviewed")]
    pub(crate) confirm_unreviewed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluationListQuery {
    #[serde(default)]
    pub(crate) skip: Option<i64>,
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionPaperInfo {
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecordResponse {
    pub(crate) id: String,
    pub(crate) sheet_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) status: ReviewStatus,
    pub(crate) teacher_approved: bool,
    pub(crate) teacher_reviewed: bool,
    pub(crate) editable: bool,
    pub(crate) breakdown: Vec<QuestionResult>,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) updated_at: String,
}

impl RecordResponse {
    pub(crate) fn from_record(record: &EvaluationRecord) -> Self {
        Self {
            id: record.id().to_string(),
            sheet_id: record.sheet_id().to_string(),
            student_name: record.student_name().to_string(),
            roll_number: record.roll_number().to_string(),
            score: record.score(),
            total_marks: record.total_marks(),
            status: record.status(),
            teacher_approved: record.teacher_approved(),
            teacher_reviewed: record.teacher_reviewed(),
            editable: record.is_editable(),
            breakdown: record.breakdown().to_vec(),
            reviewed_by: record.reviewed_by().map(str::to_string),
            reviewed_at: record.reviewed_at().map(format_primitive),
            updated_at: format_primitive(record.updated_at()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationResponse {
    pub(crate) id: String,
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    pub(crate) mode: EvaluationMode,
    pub(crate) status: EvaluationStatus,
    pub(crate) total_marks: f64,
    pub(crate) grading_progress: i32,
    pub(crate) version: i32,
    pub(crate) question_paper: Option<QuestionPaperInfo>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) finalized_at: Option<String>,
    pub(crate) finalized_by: Option<String>,
    pub(crate) summary: ReviewSummary,
    pub(crate) records: Vec<RecordResponse>,
}

impl EvaluationResponse {
    pub(crate) fn from_session(session: &EvaluationSession) -> Self {
        let header: &EvaluationSessionRow = session.header();
        let question_paper = match (&header.question_paper_filename, &header.question_paper_mime) {
            (Some(filename), Some(mime_type)) => Some(QuestionPaperInfo {
                filename: filename.clone(),
                mime_type: mime_type.clone(),
                file_size: header.question_paper_size.unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            id: header.id.clone(),
            teacher_id: header.teacher_id.clone(),
            title: header.title.clone(),
            mode: header.mode,
            status: header.status,
            total_marks: header.total_marks,
            grading_progress: header.grading_progress,
            version: header.version,
            question_paper,
            created_at: format_primitive(header.created_at),
            updated_at: format_primitive(header.updated_at),
            finalized_at: header.finalized_at.map(format_primitive),
            finalized_by: header.finalized_by.clone(),
            summary: session.summary(),
            records: session.records().iter().map(RecordResponse::from_record).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationListItem {
    pub(crate) id: String,
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    pub(crate) mode: EvaluationMode,
    pub(crate) status: EvaluationStatus,
    pub(crate) total_marks: f64,
    pub(crate) grading_progress: i32,
    pub(crate) sheet_count: i64,
    pub(crate) record_count: i64,
    pub(crate) approved_count: i64,
    pub(crate) progress_label: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl EvaluationListItem {
    pub(crate) fn from_row(row: EvaluationListRow) -> Self {
        Self {
            progress_label: format!("{}/{}", row.approved_count, row.record_count),
            id: row.id,
            teacher_id: row.teacher_id,
            title: row.title,
            mode: row.mode,
            status: row.status,
            total_marks: row.total_marks,
            grading_progress: row.grading_progress,
            sheet_count: row.sheet_count,
            record_count: row.record_count,
            approved_count: row.approved_count,
            created_at: format_primitive(row.created_at),
            updated_at: format_primitive(row.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SheetResponse {
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) file_size: i64,
    pub(crate) sha256: String,
    pub(crate) order_index: i32,
    pub(crate) graded: bool,
    pub(crate) uploaded_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) preview_data_url: Option<String>,
}

impl SheetResponse {
    pub(crate) fn from_sheet(sheet: AnswerSheet, preview_data_url: Option<String>) -> Self {
        Self {
            id: sheet.id,
            student_name: sheet.student_name,
            roll_number: sheet.roll_number,
            filename: sheet.filename,
            mime_type: sheet.mime_type,
            file_size: sheet.file_size,
            sha256: sheet.sha256,
            order_index: sheet.order_index,
            graded: sheet.graded,
            uploaded_at: format_primitive(sheet.uploaded_at),
            preview_data_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingFailure {
    pub(crate) sheet_id: String,
    pub(crate) filename: String,
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeRunResponse {
    pub(crate) grader: String,
    pub(crate) graded: usize,
    pub(crate) failed: Vec<GradingFailure>,
    pub(crate) evaluation: EvaluationResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApproveAllResponse {
    pub(crate) approved: usize,
    pub(crate) evaluation: EvaluationResponse,
}

fn default_mode() -> EvaluationMode {
    EvaluationMode::Single
}
