use ops_stats_to_xlsx::{StorageAreas, derive_output_key};
use regex::Regex;

use crate::error::ApiError;

pub const PDF_EXTENSION: &str = ".pdf";
pub const XLSX_EXTENSION: &str = ".xlsx";

/// Reduces a client-supplied name to `[A-Za-z0-9_.-]`. Whitespace and path
/// separators become `_`; leading and trailing dots and underscores go.
pub fn secure_filename(raw: &str) -> Result<String, ApiError> {
    let pattern = Regex::new(r"[^A-Za-z0-9_.\-]")
        .map_err(|error| ApiError::Internal(error.to_string()))?;

    let spaced = raw.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = pattern.replace_all(&joined, "");
    Ok(cleaned.trim_matches(['.', '_']).to_string())
}

/// Sanitizes an uploaded file name and checks it names a PDF.
pub fn upload_file_name(raw: &str) -> Result<String, ApiError> {
    let file = secure_filename(raw)?;
    if file.is_empty() {
        return Err(ApiError::BadRequest(
            "file name is empty after removing unsupported characters".to_string(),
        ));
    }
    if !file.to_ascii_lowercase().ends_with(PDF_EXTENSION) || file.len() == PDF_EXTENSION.len() {
        return Err(ApiError::BadRequest("only .pdf uploads are accepted".to_string()));
    }
    Ok(file)
}

/// Checks a stored file name passed back by a client. Anything the
/// sanitizer would change is rejected rather than silently rewritten.
pub fn stored_file_name(raw: &str, extension: &str) -> Result<String, ApiError> {
    let file = secure_filename(raw)?;
    if file.is_empty() || file != raw {
        return Err(ApiError::BadRequest(format!("invalid file name: {raw:?}")));
    }
    if !file.to_ascii_lowercase().ends_with(extension) {
        return Err(ApiError::BadRequest(format!(
            "file name must end with {extension}"
        )));
    }
    Ok(file)
}

pub fn upload_key(areas: &StorageAreas, file: &str) -> String {
    format!("{}/{file}", areas.incoming)
}

pub fn artifact_key(areas: &StorageAreas, file: &str) -> String {
    format!("{}/{file}", areas.outgoing)
}

pub fn key_prefix(area: &str) -> String {
    format!("{area}/")
}

/// `static/sample1.pdf` → `download/sample1.xlsx`.
pub fn artifact_key_for_upload(areas: &StorageAreas, upload_key: &str) -> Result<String, ApiError> {
    derive_output_key(upload_key, areas).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "'{upload_key}' is not inside the '{}' area",
            areas.incoming
        ))
    })
}

pub fn file_from_key(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, file)| file)
}

pub fn attachment_disposition(file: &str) -> String {
    format!(
        "attachment; filename=\"{file}\"; filename*=UTF-8''{}",
        urlencoding::encode(file)
    )
}
