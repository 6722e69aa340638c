use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::{validate_sheet_upload, validate_upload_size};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::EvaluationStatus;
use crate::repositories;
use crate::repositories::evaluations::SheetInsert;
use crate::schemas::evaluation::{QuestionPaperInfo, SheetResponse};
use crate::services::answer_sheets::{preview_data_url, PreparedSheet};

use super::helpers::{load_header, read_file};

const FILE_FIELDS: [&str; 3] = ["file", "files", "sheets"];

#[derive(Debug, Serialize)]
pub(super) struct SheetUploadResponse {
    sheets: Vec<SheetResponse>,
    total_sheets: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct SheetListResponse {
    sheets: Vec<SheetResponse>,
}

struct UploadedFile {
    filename: String,
    mime_type: String,
    bytes: Vec<u8>,
    student_name: Option<String>,
    roll_number: Option<String>,
}

/// `student_name` / `roll_number` text fields attach to the next file part.
#[derive(Default)]
struct SheetForm {
    files: Vec<UploadedFile>,
    pending_name: Option<String>,
    pending_roll: Option<String>,
}

async fn read_sheet_form(state: &AppState, mut multipart: Multipart) -> Result<SheetForm, ApiError> {
    let uploads = state.settings().uploads();
    let max_bytes = uploads.max_upload_bytes();
    let mut form = SheetForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "student_name" | "studentName" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest("Invalid student_name field".to_string()))?;
                form.pending_name = Some(value);
            }
            "roll_number" | "rollNumber" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest("Invalid roll_number field".to_string()))?;
                form.pending_roll = Some(value);
            }
            name if FILE_FIELDS.contains(&name) => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("File must have a filename".to_string()))?;
                let mime_type = validate_sheet_upload(
                    &filename,
                    field.content_type(),
                    &uploads.allowed_sheet_extensions,
                )?;
                let bytes = read_file(&mut field, max_bytes).await?;
                validate_upload_size(bytes.len(), max_bytes)?;
                form.files.push(UploadedFile {
                    filename,
                    mime_type,
                    bytes,
                    student_name: form.pending_name.take(),
                    roll_number: form.pending_roll.take(),
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

pub(super) async fn upload_question_paper(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<QuestionPaperInfo>, ApiError> {
    let header = load_header(&state, &user, &evaluation_id).await?;
    if header.status != EvaluationStatus::Draft {
        return Err(ApiError::Conflict(
            "Question paper can only be changed before grading".to_string(),
        ));
    }

    let mut form = read_sheet_form(&state, multipart).await?;
    if form.files.len() != 1 {
        return Err(ApiError::BadRequest("Upload exactly one question paper file".to_string()));
    }
    let Some(upload) = form.files.pop() else {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    };

    let paper = PreparedSheet::new(&upload.filename, &upload.mime_type, upload.bytes, None, None, 0);
    let stored = repositories::evaluations::set_question_paper(
        state.db(),
        &header.id,
        &paper,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store question paper"))?;
    if !stored {
        return Err(ApiError::Conflict(
            "Question paper can only be changed before grading".to_string(),
        ));
    }

    tracing::info!(
        evaluation_id = %header.id,
        filename = %paper.filename,
        size = paper.bytes.len(),
        "Question paper uploaded"
    );

    Ok(Json(QuestionPaperInfo {
        file_size: paper.bytes.len() as i64,
        filename: paper.filename,
        mime_type: paper.mime_type,
    }))
}

/// Accepts one or more sheets. A sheet without explicit identity fields gets its student
/// name from the filename and its roll number from its position.
pub(super) async fn upload_answer_sheets(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SheetUploadResponse>), ApiError> {
    let header = load_header(&state, &user, &evaluation_id).await?;
    if header.status != EvaluationStatus::Draft {
        return Err(ApiError::Conflict(
            "Answer sheets can only be added before grading".to_string(),
        ));
    }

    let form = read_sheet_form(&state, multipart).await?;
    if form.files.is_empty() {
        return Err(ApiError::BadRequest("No answer sheet uploaded".to_string()));
    }

    let existing = repositories::evaluations::count_sheets(state.db(), &header.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count answer sheets"))?;

    let prepared: Vec<PreparedSheet> = form
        .files
        .into_iter()
        .enumerate()
        .map(|(index, upload)| {
            PreparedSheet::new(
                &upload.filename,
                &upload.mime_type,
                upload.bytes,
                upload.student_name,
                upload.roll_number,
                existing as usize + index,
            )
        })
        .collect();

    let max_sheets = state.settings().uploads().max_sheets_per_evaluation as i64;
    let outcome = repositories::evaluations::insert_sheets(
        state.db(),
        &header.id,
        &prepared,
        max_sheets,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store answer sheets"))?;

    let inserted = match outcome {
        SheetInsert::Inserted(rows) => rows,
        SheetInsert::LimitExceeded { existing, limit } => {
            return Err(ApiError::BadRequest(format!(
                "This evaluation accepts at most {limit} answer sheet(s); {existing} already uploaded"
            )));
        }
        SheetInsert::NotDraft => {
            return Err(ApiError::Conflict(
                "Answer sheets can only be added before grading".to_string(),
            ));
        }
    };

    tracing::info!(
        evaluation_id = %header.id,
        uploaded = inserted.len(),
        "Answer sheets uploaded"
    );

    let total_sheets = existing + inserted.len() as i64;
    let sheets = inserted
        .into_iter()
        .zip(prepared.iter())
        .map(|(row, sheet)| {
            let preview = preview_data_url(&sheet.mime_type, &sheet.bytes);
            SheetResponse::from_sheet(row, preview)
        })
        .collect();

    Ok((StatusCode::CREATED, Json(SheetUploadResponse { sheets, total_sheets })))
}

pub(super) async fn list_answer_sheets(
    Path(evaluation_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SheetListResponse>, ApiError> {
    let header = load_header(&state, &user, &evaluation_id).await?;
    let rows = repositories::evaluations::list_sheets(state.db(), &header.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answer sheets"))?;

    let sheets = rows.into_iter().map(|row| SheetResponse::from_sheet(row, None)).collect();
    Ok(Json(SheetListResponse { sheets }))
}
