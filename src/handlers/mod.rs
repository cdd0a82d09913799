pub mod analyze;
pub mod config;

pub use analyze::analyze;
pub use config::get_config;

use crate::error::{AppError, AppResult};
use crate::health;
use actix_web::{web, HttpRequest, HttpResponse};

/// Every route the service answers.
///
/// The analysis endpoint lives at the root where the browser client posts to
/// it, and again under `/api/v1` beside the operational endpoints.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/analyze", web::post().to(analyze))
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1")
                .route("/analyze", web::post().to(analyze))
                .route("/health", web::get().to(health::health_check))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/config", web::get().to(get_config)),
        );
}

/// Fallback for unknown routes, so clients always receive JSON.
pub async fn not_found(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(AppError::NotFound(format!("No route for {} {}", req.method(), req.path())))
}
