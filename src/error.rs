use std::fmt::{Display, Formatter};

use ops_stats_to_xlsx::{ErrorKind, ReportError};
use worker::{Response, Result};

use crate::models::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// The pipeline rejected the document. Only the kind crosses the API.
    Report(ErrorKind),
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Report(kind) => kind.as_str(),
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Internal(message) => {
                message
            }
            Self::Report(kind) => report_message(*kind),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Report(kind) => match kind {
                ErrorKind::DestinationUnwritable | ErrorKind::Internal => 500,
                _ => 422,
            },
            Self::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Result<Response> {
        let mut response = Response::from_json(&ErrorResponse {
            code: self.code().to_string(),
            message: self.message().to_string(),
        })?;
        response.headers_mut().set("Cache-Control", "no-store")?;
        Ok(response.with_status(self.status_code()))
    }
}

/// Operator-facing wording for each pipeline failure.
pub fn report_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::SourceUnreadable => "the uploaded file could not be read as a PDF",
        ErrorKind::PageNotFound => "the requested page does not exist in this document",
        ErrorKind::NoTableDetected => "no ruled table was found on the selected page",
        ErrorKind::SchemaMismatch => "the table parts on the page do not share the same columns",
        ErrorKind::MalformedNumericCell => "a numeric column contains a value that is not a whole number",
        ErrorKind::RequiredColumnMissing => {
            "the table lacks one of the passenger, seat, cargo or mail columns"
        }
        ErrorKind::DivisionByZero => "a month reports zero seats, so the load factor is undefined",
        ErrorKind::DestinationUnwritable => "the converted workbook could not be stored",
        ErrorKind::InvalidInput => "the document or request cannot be processed as given",
        ErrorKind::Internal => "the workbook could not be generated",
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl From<ReportError> for ApiError {
    fn from(error: ReportError) -> Self {
        match std::error::Error::source(&error) {
            Some(cause) => worker::console_error!("report conversion failed: {error}: {cause}"),
            None => worker::console_error!("report conversion failed: {error}"),
        }
        Self::Report(error.kind())
    }
}

impl From<worker::Error> for ApiError {
    fn from(error: worker::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<worker::KvError> for ApiError {
    fn from(error: worker::KvError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        Self::BadRequest(error.to_string())
    }
}
