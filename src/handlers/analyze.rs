//! # Analysis Endpoint
//!
//! ## Endpoint: `POST /analyze`
//!
//! ## Request:
//! Multipart form data with the recording in a file field named `audio`
//! (configurable through `uploads.field_name`).
//!
//! ## Responses:
//! - `400 {"error": "No file uploaded"}`: not a multipart form, or no file in the field
//! - `400 {"error": "File too large ..."}`: upload exceeds `uploads.max_file_size_mb`
//! - `200 {"error": "..."}`: the audio could not be transcoded or analyzed
//! - `200 {...}`: the analysis, in the configured output shape
//!
//! ```json
//! {
//!   "pitch": [{"x": 0.41, "y": 218.7}],
//!   "f1": [{"x": 0.0, "y": null}, {"x": 0.04, "y": 712.3}],
//!   "f2": [...],
//!   "f3": [...],
//!   "hnr": 14.2
//! }
//! ```
//!
//! ## Rust Concepts:
//! - **Streams**: the multipart body is consumed chunk by chunk with `StreamExt::next`
//! - **web::block**: the pipeline is blocking work and runs on a dedicated thread pool,
//!   keeping the async workers free to accept other requests

use crate::audio::UploadedAudio;
use crate::error::{AppError, AppResult};
use crate::middleware::RequestId;
use crate::report::ReportValue;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpMessage, HttpRequest, HttpResponse};
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const NO_FILE: &str = "No file uploaded";

pub async fn analyze(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let upload = read_upload(
        &req,
        payload,
        &state.config.uploads.field_name,
        state.config.max_upload_bytes(),
    )
    .await?;

    info!(
        request_id = %request_id,
        filename = upload.filename().unwrap_or("<none>"),
        bytes = upload.bytes().len(),
        "Upload received"
    );

    state.begin_analysis();
    let pipeline = Arc::clone(&state.pipeline);
    let job_id = request_id.clone();
    let outcome = web::block(move || pipeline.run(&upload, &job_id)).await;

    let body = match outcome {
        Ok(Ok(report)) => {
            state.finish_analysis(true);
            report
        }
        Ok(Err(e)) => {
            state.finish_analysis(false);
            ReportValue::error(e.to_string())
        }
        Err(e) => {
            state.finish_analysis(false);
            error!(request_id = %request_id, error = %e, "Analysis worker did not finish");
            ReportValue::error("Analysis failed unexpectedly")
        }
    };

    Ok(HttpResponse::Ok().json(body))
}

/// Pull the first file in `field_name` out of the multipart body.
///
/// Parts without a filename are ordinary form values, not files, and are
/// skipped. Anything beyond `max_bytes` is rejected before it is buffered.
async fn read_upload(
    req: &HttpRequest,
    payload: web::Payload,
    field_name: &str,
    max_bytes: usize,
) -> AppResult<UploadedAudio> {
    if !is_multipart_form(req) {
        return Err(AppError::ValidationError(NO_FILE.to_string()));
    }

    let mut multipart = Multipart::new(req.headers(), payload);

    while let Some(item) = multipart.next().await {
        let mut field =
            item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let Some(disposition) = field.content_disposition() else {
            continue;
        };
        if disposition.get_name() != Some(field_name) {
            continue;
        }
        let Some(filename) = disposition.get_filename().map(str::to_string) else {
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::ValidationError(format!(
                    "File too large (max: {} bytes)",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(UploadedAudio::new(bytes, Some(filename)));
    }

    Err(AppError::ValidationError(NO_FILE.to_string()))
}

fn is_multipart_form(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}
