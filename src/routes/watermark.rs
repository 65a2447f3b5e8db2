use actix_web::{web, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::services::{tile_watermark, WatermarkOptions};
use crate::state::AppState;

/// POST /api/watermark
/// Returns the watermarked JPEG preview for the posted image bytes.
pub async fn watermark_preview(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let Some(logo) = state.watermark_logo.as_ref() else {
        return Err(AppError::Validation(
            "watermarking is not configured".to_string(),
        ));
    };

    if body.is_empty() {
        return Err(AppError::Validation("empty image payload".to_string()));
    }

    let options = WatermarkOptions::from(&state.config.watermark);
    let preview = tile_watermark(&body, logo, &options)?;

    Ok(HttpResponse::Ok()
        .content_type("image/jpeg")
        .body(preview))
}

/// Configures the watermark routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/watermark", web::post().to(watermark_preview));
}
