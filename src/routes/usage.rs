use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::is_allowed;
use crate::routes::admission::anon_counter_key;
use crate::services::UsageService;
use crate::state::AppState;

/// Identity that just completed a successful generation
#[derive(Debug, Deserialize)]
pub struct RecordUsageRequest {
    pub customer_id: Option<String>,
    pub device_token: Option<String>,
}

/// POST /api/usage
/// Records one successful generation for the identity.
///
/// Bookkeeping failures are logged, not surfaced: the customer already got
/// their image, and the backfill sweep repairs anything this path loses.
pub async fn record_usage(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RecordUsageRequest>,
) -> AppResult<HttpResponse> {
    if let Some(customer_id) = body.customer_id.as_deref() {
        return record_customer_usage(&state, customer_id).await;
    }

    let key = anon_counter_key(&req, body.device_token.as_deref())?;
    let window = Duration::seconds(state.config.quota.anon_window_secs);

    match state.counters.increment(&key, window).await {
        Ok(total) => Ok(HttpResponse::Ok().json(json!({ "recorded": true, "total": total }))),
        Err(e) => {
            log::error!("Anonymous usage increment failed for {}: {}", key, e);
            Ok(HttpResponse::Ok().json(json!({ "recorded": false })))
        }
    }
}

async fn record_customer_usage(
    state: &web::Data<AppState>,
    customer_id: &str,
) -> AppResult<HttpResponse> {
    match UsageService::record_usage(
        state.directory.as_ref(),
        &state.queue,
        &state.config.quota,
        customer_id,
    )
    .await
    {
        Ok(total) => Ok(HttpResponse::Ok().json(json!({
            "recorded": true,
            "total": total,
            "limit_reached": total >= state.config.quota.free_tier_limit,
        }))),
        // An unknown customer is a caller bug, not a bookkeeping glitch
        Err(AppError::NotFound(msg)) => Err(AppError::NotFound(msg)),
        Err(e) => {
            log::error!("Usage recording failed for {}: {}", customer_id, e);
            Ok(HttpResponse::Ok().json(json!({ "recorded": false })))
        }
    }
}

/// GET /api/usage/{customer_id}
/// Normalized usage report for a registered customer.
pub async fn get_usage(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let customer_id = path.into_inner();
    let (_, value) =
        UsageService::current_usage(state.directory.as_ref(), &customer_id).await?;
    let limit = state.config.quota.free_tier_limit;

    Ok(HttpResponse::Ok().json(json!({
        "customer_id": customer_id,
        "used": value.total,
        "limit": limit,
        "remaining": (limit - value.total).max(0),
        "allowed": is_allowed(value.total, limit),
    })))
}

/// Configures the usage routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/usage", web::post().to(record_usage))
        .route("/api/usage/{customer_id}", web::get().to(get_usage));
}
