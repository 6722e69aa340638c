use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Images above this size are listed without an inline preview.
const MAX_PREVIEW_BYTES: usize = 512 * 1024;

/// An uploaded answer sheet that passed validation and is ready to store.
#[derive(Debug, Clone)]
pub(crate) struct PreparedSheet {
    pub(crate) filename: String,
    pub(crate) mime_type: String,
    pub(crate) student_name: String,
    pub(crate) roll_number: String,
    pub(crate) sha256: String,
    pub(crate) bytes: Vec<u8>,
}

impl PreparedSheet {
    /// `position` is the zero-based slot of the sheet inside its evaluation.
    pub(crate) fn new(
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        student_name: Option<String>,
        roll_number: Option<String>,
        position: usize,
    ) -> Self {
        let student_name = student_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| student_name_from_filename(filename, position));
        let roll_number = roll_number
            .map(|roll| roll.trim().to_string())
            .filter(|roll| !roll.is_empty())
            .unwrap_or_else(|| roll_number_for(position));

        Self {
            filename: sanitized_filename(filename),
            mime_type: mime_type.to_string(),
            student_name,
            roll_number,
            sha256: sha256_hex(&bytes),
            bytes,
        }
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(crate) fn preview_data_url(mime_type: &str, bytes: &[u8]) -> Option<String> {
    if !mime_type.starts_with("image/") || bytes.len() > MAX_PREVIEW_BYTES {
        return None;
    }
    Some(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
}

pub(crate) fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

pub(crate) fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// "ada_lovelace-final.png" becomes "Ada Lovelace Final".
pub(crate) fn student_name_from_filename(filename: &str, position: usize) -> String {
    let stem = Path::new(filename).file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();

    let name = stem
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        format!("Student {}", position + 1)
    } else {
        name
    }
}

pub(crate) fn roll_number_for(position: usize) -> String {
    format!("R{:03}", position + 1)
}

pub(crate) fn sanitized_filename(name: &str) -> String {
    let base = Path::new(name).file_name().and_then(|base| base.to_str()).unwrap_or(name);
    let sanitized: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_' || *c == '-')
        .collect();

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
