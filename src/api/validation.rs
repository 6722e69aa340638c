use crate::api::errors::ApiError;
use crate::services::answer_sheets::{file_extension, mime_for_extension};

/// Checks the extension against the allow-list and the declared MIME type against the
/// extension. Returns the MIME type to store; a missing or generic one is inferred.
pub(crate) fn validate_sheet_upload(
    filename: &str,
    content_type: Option<&str>,
    allowed_extensions: &[String],
) -> Result<String, ApiError> {
    let extension = file_extension(filename)
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!("File extension '{extension}' is not allowed")));
    }

    let expected = mime_for_extension(&extension).ok_or_else(|| {
        ApiError::BadRequest(format!("File extension '{extension}' is not supported"))
    })?;

    let mime = content_type.map(|value| value.trim().to_ascii_lowercase()).unwrap_or_default();
    if mime.is_empty() || mime == "application/octet-stream" {
        return Ok(expected.to_string());
    }

    if mime_allowed_for_extension(&mime, &extension) {
        Ok(expected.to_string())
    } else {
        Err(ApiError::BadRequest(format!(
            "MIME type '{mime}' does not match extension '.{extension}'"
        )))
    }
}

pub(crate) fn validate_upload_size(size: usize, max_bytes: u64) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if size as u64 > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed ({} MB)",
            max_bytes / 1024 / 1024
        )));
    }
    Ok(())
}

fn mime_allowed_for_extension(mime: &str, extension: &str) -> bool {
    match extension {
        "jpg" | "jpeg" => matches!(mime, "image/jpeg" | "image/jpg"),
        "png" => mime == "image/png",
        "webp" => mime == "image/webp",
        "pdf" => mime == "application/pdf",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["jpg", "jpeg", "png", "pdf"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_matching_types() {
        assert_eq!(validate_sheet_upload("a.JPG", Some("image/jpg"), &allowed()).unwrap(), "image/jpeg");
        assert_eq!(
            validate_sheet_upload("paper.pdf", Some("application/pdf"), &allowed()).unwrap(),
            "application/pdf"
        );
    }

    #[test]
    fn infers_missing_mime_from_extension() {
        assert_eq!(validate_sheet_upload("a.png", None, &allowed()).unwrap(), "image/png");
        assert_eq!(
            validate_sheet_upload("a.png", Some("application/octet-stream"), &allowed()).unwrap(),
            "image/png"
        );
    }

    #[test]
    fn rejects_mismatch_and_disallowed() {
        assert!(validate_sheet_upload("a.png", Some("image/jpeg"), &allowed()).is_err());
        assert!(validate_sheet_upload("a.webp", Some("image/webp"), &allowed()).is_err());
        assert!(validate_sheet_upload("noext", Some("image/png"), &allowed()).is_err());
    }

    #[test]
    fn size_limits() {
        assert!(matches!(validate_upload_size(0, 10), Err(ApiError::BadRequest(_))));
        assert!(matches!(validate_upload_size(11, 10), Err(ApiError::PayloadTooLarge(_))));
        assert!(validate_upload_size(10, 10).is_ok());
    }
}
