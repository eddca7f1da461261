use serde::{Deserialize, Serialize};

pub const REPORTS_BINDING: &str = "REPORTS";
pub const PAGES_VAR: &str = "REPORT_PAGES";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Stored next to every uploaded PDF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadMetadata {
    pub name: String,
    pub title: String,
    pub uploaded_at: String,
    pub size: usize,
}

/// Stored next to every generated workbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub source: String,
    pub created_at: String,
    pub rows: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadRecord {
    pub file: String,
    #[serde(flatten)]
    pub metadata: Option<UploadMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub file: String,
    #[serde(flatten)]
    pub metadata: Option<ArtifactMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadListResponse {
    pub items: Vec<UploadRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactListResponse {
    pub items: Vec<ArtifactRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub file: String,
    pub key: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessResponse {
    pub source: String,
    pub artifact: String,
    pub rows: usize,
    pub tables: usize,
    pub columns: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResponse {
    pub file: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
