//! # Error Handling
//!
//! This module defines the service's error types and how they turn into HTTP
//! responses. There are two families, and they are kept apart on purpose:
//!
//! - [`AppError`]: the request itself is unusable (no file, file too large,
//!   unknown route). These map to real HTTP error statuses.
//! - [`PipelineError`]: the request was fine but processing the audio failed
//!   (the transcoder rejected it, analysis could not read it, scratch space
//!   could not be created). Clients receive these as a `200 OK` with an
//!   `{"error": ...}` body, which is the contract the browser client expects.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of error
//! - **Data**: Each variant carries the human-readable message
//! - **Pattern matching**: `match` decides status codes and wording
//!
//! ### Traits for Error Conversion
//! - **Display trait**: Defines how errors are formatted as strings
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **From trait**: Lets `?` convert I/O failures automatically

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Errors that reject a request before any audio is processed.
///
/// ## Error Categories:
/// - **ValidationError**: Client sent no file, the wrong form, or too much data (400)
/// - **NotFound**: Requested route doesn't exist (404)
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::ValidationError("No file uploaded".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// User input failed validation rules
    ValidationError(String),

    /// Requested resource was not found
    NotFound(String),
}

impl AppError {
    /// The message without the category prefix, as sent to clients.
    pub fn message(&self) -> &str {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

/// Maps each error to its status code with a flat JSON body:
///
/// ```json
/// { "error": "No file uploaded" }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.message()
        }))
    }
}

/// Failures while turning an accepted upload into a report.
///
/// ## Why a separate type:
/// These never become HTTP error statuses. The handler renders them as a
/// successful response carrying `{"error": <Display output>}`, so the
/// `Display` text *is* the client-facing message.
#[derive(Debug)]
pub enum PipelineError {
    /// The external transcoder failed; carries its diagnostic output
    Transcoding(String),

    /// The audio could not be read or measured
    Analysis(String),

    /// Scratch files could not be created or written
    Storage(String),
}

impl PipelineError {
    /// Short machine-readable name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transcoding(_) => "transcoding_error",
            PipelineError::Analysis(_) => "analysis_error",
            PipelineError::Storage(_) => "storage_error",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Transcoding(diagnostic) => write!(f, "FFmpeg error: {}", diagnostic),
            PipelineError::Analysis(msg) => write!(f, "{}", msg),
            PipelineError::Storage(msg) => write!(f, "Temporary storage error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Scratch-file I/O is the only place `std::io::Error` reaches the pipeline.
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

/// Type alias for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_validation_error_body() {
        let response = AppError::ValidationError("No file uploaded".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({"error": "No file uploaded"}));
    }

    #[test]
    fn test_not_found_status() {
        let err = AppError::NotFound("/nope".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not found: /nope");
    }

    #[test]
    fn test_pipeline_error_messages() {
        let transcoding = PipelineError::Transcoding("Invalid data found when processing input".to_string());
        assert_eq!(
            transcoding.to_string(),
            "FFmpeg error: Invalid data found when processing input"
        );
        assert_eq!(transcoding.kind(), "transcoding_error");

        let analysis = PipelineError::Analysis("Audio file contains no samples".to_string());
        assert_eq!(analysis.to_string(), "Audio file contains no samples");

        let io: PipelineError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(matches!(io, PipelineError::Storage(_)));
    }
}
