use ops_stats_to_xlsx::{ConversionReport, ErrorKind, ReportWarning, StorageAreas, WarningCode};
use pretty_assertions::assert_eq;
use url::Url;

use ops_stats_worker::error::ApiError;
use ops_stats_worker::models::{UploadMetadata, UploadRecord};
use ops_stats_worker::pipeline::{process_response, report_options};
use ops_stats_worker::routes::{optional_param, parse_query, required_param};
use ops_stats_worker::upload::{
    artifact_key_for_upload, attachment_disposition, file_from_key, secure_filename,
    stored_file_name, upload_file_name, upload_key,
};

#[test]
fn secure_filename_keeps_only_portable_characters() {
    assert_eq!(secure_filename("sample1.pdf").expect("name"), "sample1.pdf");
    assert_eq!(
        secure_filename("My Report 2023.pdf").expect("name"),
        "My_Report_2023.pdf"
    );
    assert_eq!(
        secure_filename("../../etc/passwd.pdf").expect("name"),
        "etc_passwd.pdf"
    );
    assert_eq!(
        secure_filename(r"C:\reports\june.pdf").expect("name"),
        "C_reports_june.pdf"
    );
    assert_eq!(secure_filename(".hidden.pdf").expect("name"), "hidden.pdf");
    assert_eq!(secure_filename("月次報告.pdf").expect("name"), "pdf");
}

#[test]
fn uploads_must_be_named_pdfs() {
    assert_eq!(
        upload_file_name("2023 statistics.PDF").expect("accepted"),
        "2023_statistics.PDF"
    );
    assert!(matches!(
        upload_file_name("月次報告.pdf"),
        Err(ApiError::BadRequest(_))
    ));
    assert!(matches!(
        upload_file_name("notes.txt"),
        Err(ApiError::BadRequest(_))
    ));
    assert!(matches!(upload_file_name("///"), Err(ApiError::BadRequest(_))));
}

#[test]
fn stored_names_are_not_rewritten() {
    assert_eq!(
        stored_file_name("sample1.xlsx", ".xlsx").expect("valid"),
        "sample1.xlsx"
    );
    assert!(stored_file_name("../sample1.xlsx", ".xlsx").is_err());
    assert!(stored_file_name("sample1.pdf", ".xlsx").is_err());
}

#[test]
fn artifact_keys_follow_the_area_convention() {
    let areas = StorageAreas::default();
    let key = upload_key(&areas, "sample1.pdf");
    assert_eq!(key, "static/sample1.pdf");
    assert_eq!(
        artifact_key_for_upload(&areas, &key).expect("derived"),
        "download/sample1.xlsx"
    );
    assert!(artifact_key_for_upload(&areas, "download/sample1.xlsx").is_err());
    assert_eq!(file_from_key("download/sample1.xlsx"), "sample1.xlsx");
    assert_eq!(file_from_key("sample1.xlsx"), "sample1.xlsx");
}

#[test]
fn download_is_served_as_attachment() {
    assert_eq!(
        attachment_disposition("sample1.xlsx"),
        "attachment; filename=\"sample1.xlsx\"; filename*=UTF-8''sample1.xlsx"
    );
}

#[test]
fn query_parameters_are_decoded_and_trimmed() {
    let url = Url::parse(
        "https://reports.example/api/v1/uploads?filename=june%202023.pdf&name=%E5%B1%B1%E7%94%B0&title=",
    )
    .expect("url");
    let query = parse_query(&url);

    assert_eq!(
        required_param(&query, "filename").expect("present"),
        "june 2023.pdf"
    );
    assert_eq!(optional_param(&query, "name"), "山田");
    assert_eq!(optional_param(&query, "title"), "");
    assert!(matches!(
        required_param(&query, "title"),
        Err(ApiError::BadRequest(_))
    ));
    assert!(required_param(&query, "file").is_err());
}

#[test]
fn page_selection_comes_from_environment() {
    let default = report_options(None).expect("default");
    assert_eq!(default.pages.iter().collect::<Vec<_>>(), vec![1]);

    let blank = report_options(Some("  ")).expect("blank falls back");
    assert_eq!(blank.pages.iter().collect::<Vec<_>>(), vec![1]);

    let custom = report_options(Some("1-2")).expect("range");
    assert_eq!(custom.pages.iter().collect::<Vec<_>>(), vec![1, 2]);

    assert!(matches!(
        report_options(Some("0")),
        Err(ApiError::Internal(_))
    ));
}

#[test]
fn process_response_summarizes_the_conversion() {
    let report = ConversionReport {
        row_count: 12,
        table_count: 2,
        column_count: 9,
        warnings: vec![
            ReportWarning::new(WarningCode::UnmappedColumn, "column kept as printed")
                .with_column("前年同月比"),
        ],
    };

    let response = process_response("sample1.pdf", "sample1.xlsx", &report);
    assert_eq!(response.source, "sample1.pdf");
    assert_eq!(response.artifact, "sample1.xlsx");
    assert_eq!(response.rows, 12);
    assert_eq!(response.tables, 2);
    assert_eq!(response.columns, 9);
    assert_eq!(response.warnings, vec!["column kept as printed: 前年同月比"]);
}

#[test]
fn pipeline_failures_map_to_operator_messages() {
    let zero_seats = ApiError::Report(ErrorKind::DivisionByZero);
    assert_eq!(zero_seats.code(), "division_by_zero");
    assert_eq!(zero_seats.status_code(), 422);
    assert!(zero_seats.message().contains("zero seats"));

    let no_table = ApiError::Report(ErrorKind::NoTableDetected);
    assert_eq!(no_table.code(), "no_table_detected");
    assert_eq!(no_table.status_code(), 422);

    let storage = ApiError::Report(ErrorKind::DestinationUnwritable);
    assert_eq!(storage.status_code(), 500);
    assert!(!storage.message().contains('/'));
}

#[test]
fn upload_records_flatten_metadata() {
    let record = UploadRecord {
        file: "sample1.pdf".to_string(),
        metadata: Some(UploadMetadata {
            name: "Yamada".to_string(),
            title: "June".to_string(),
            uploaded_at: "2026-06-01T00:00:00+00:00".to_string(),
            size: 2048,
        }),
    };

    let json = serde_json::to_value(&record).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({
            "file": "sample1.pdf",
            "name": "Yamada",
            "title": "June",
            "uploaded_at": "2026-06-01T00:00:00+00:00",
            "size": 2048
        })
    );
}
