use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    store: &'static str,
}

/// Liveness check - is the process running?
/// Returns 200 if the server is alive.
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(LivenessResponse { status: "ok" })
}

/// Readiness check - is the service ready to handle requests?
/// Returns 200 if the counter store is reachable, 503 otherwise.
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let store_healthy = state.counters.ping().await;

    let (status, store_status, http_status) = if store_healthy {
        ("ready", "ok", StatusCode::OK)
    } else {
        ("not_ready", "error", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = ReadinessResponse {
        status,
        checks: ReadinessChecks {
            store: store_status,
        },
    };

    HttpResponse::build(http_status).json(response)
}

/// Configures the health routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .route("", web::get().to(liveness))
            .route("/ready", web::get().to(readiness)),
    );
}
