use std::str::FromStr;

use chrono::Utc;
use ops_stats_to_xlsx::{ConversionReport, PageSelection, ReportOptions, convert_report_bytes};

use crate::error::ApiError;
use crate::models::{ArtifactMetadata, ProcessResponse};
use crate::storage::ReportStore;
use crate::upload::{artifact_key_for_upload, file_from_key, upload_key};

/// Builds pipeline options from the optional `REPORT_PAGES` value.
pub fn report_options(pages: Option<&str>) -> Result<ReportOptions, ApiError> {
    let Some(pages) = pages.map(str::trim).filter(|pages| !pages.is_empty()) else {
        return Ok(ReportOptions::default());
    };

    let pages = PageSelection::from_str(pages)
        .map_err(|error| ApiError::Internal(format!("invalid REPORT_PAGES: {error}")))?;
    Ok(ReportOptions {
        pages,
        ..ReportOptions::default()
    })
}

pub fn process_response(source: &str, artifact: &str, report: &ConversionReport) -> ProcessResponse {
    ProcessResponse {
        source: source.to_string(),
        artifact: artifact.to_string(),
        rows: report.row_count,
        tables: report.table_count,
        columns: report.column_count,
        warnings: report
            .warnings
            .iter()
            .map(|warning| match &warning.column {
                Some(column) => format!("{}: {column}", warning.message),
                None => warning.message.clone(),
            })
            .collect(),
    }
}

/// Converts a stored upload and stores the workbook under the derived key.
/// Nothing is written unless the whole conversion succeeds.
pub async fn process_upload(
    store: &ReportStore,
    file: &str,
    options: &ReportOptions,
) -> Result<ProcessResponse, ApiError> {
    let source_key = upload_key(&options.areas, file);
    let pdf = store
        .get_bytes(&source_key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("upload '{file}' not found")))?;

    let artifact_key = artifact_key_for_upload(&options.areas, &source_key)?;
    let (workbook, report) = convert_report_bytes(&pdf, options)?;

    let metadata = ArtifactMetadata {
        source: file.to_string(),
        created_at: Utc::now().to_rfc3339(),
        rows: report.row_count,
        size: workbook.len(),
    };
    store.put_bytes(&artifact_key, &workbook, &metadata).await?;
    worker::console_log!(
        "converted {source_key} into {artifact_key} ({} rows)",
        report.row_count
    );

    Ok(process_response(file, file_from_key(&artifact_key), &report))
}
