use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::services::{BackfillService, ReconcileService};
use crate::state::AppState;

/// Requires the platform scheduler's bearer secret when one is configured
fn authorize(req: &HttpRequest, state: &AppState) -> AppResult<()> {
    let Some(secret) = state.config.cron.secret.as_deref() else {
        return Ok(());
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(secret) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("invalid cron secret".to_string()))
    }
}

/// POST /internal/cron/reconcile
/// Processes queued resets past their cooldown. Returns the run summary.
pub async fn run_reconcile(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &state)?;

    let summary = ReconcileService::run(
        state.queue.as_ref(),
        state.directory.as_ref(),
        state.mailer.as_ref(),
        state.audit.as_ref(),
        &state.config.quota,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// POST /internal/cron/backfill
/// Re-creates reset rows the request path lost. Returns the run summary.
pub async fn run_backfill(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    authorize(&req, &state)?;

    let summary = BackfillService::run(
        state.directory.as_ref(),
        state.queue.as_ref(),
        &state.config.quota,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// Configures the scheduled-job routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/internal/cron")
            .route("/reconcile", web::post().to(run_reconcile))
            .route("/backfill", web::post().to(run_backfill)),
    );
}
