use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::services::{device_key, ip_key, AdmissionDecision, AdmissionService};
use crate::state::AppState;

/// Identity of the caller asking for one more generation
#[derive(Debug, Deserialize)]
pub struct AdmissionRequest {
    /// Registered customer id; authoritative when present
    pub customer_id: Option<String>,
    /// Opaque client-generated token for anonymous shoppers
    pub device_token: Option<String>,
}

/// POST /api/admission
/// Decides whether the identity may perform one more generation.
/// Called by the generation pipeline before the expensive AI call.
pub async fn check_admission(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AdmissionRequest>,
) -> AppResult<HttpResponse> {
    let decision = if let Some(customer_id) = body.customer_id.as_deref() {
        AdmissionService::check_customer(
            state.directory.as_ref(),
            &state.config.quota,
            customer_id,
        )
        .await?
    } else {
        let key = anon_counter_key(&req, body.device_token.as_deref())?;
        AdmissionService::check_anonymous(state.counters.as_ref(), &state.config.quota, &key).await
    };

    Ok(match decision {
        AdmissionDecision::Allowed { remaining } => {
            HttpResponse::Ok().json(json!({ "allowed": true, "remaining": remaining }))
        }
        AdmissionDecision::Denied {
            used,
            limit,
            retry_after_secs,
        } => {
            log::info!("Admission denied: used={} limit={}", used, limit);
            let mut response = HttpResponse::TooManyRequests();
            if let Some(secs) = retry_after_secs {
                response.insert_header(("Retry-After", secs.to_string()));
            }
            response.json(json!({
                "error": "quota_exhausted",
                "used": used,
                "limit": limit,
            }))
        }
    })
}

/// Counter key for an anonymous identity: device token when the client sent
/// one, peer address otherwise
pub(crate) fn anon_counter_key(req: &HttpRequest, device_token: Option<&str>) -> AppResult<String> {
    if let Some(token) = device_token {
        if token.is_empty() {
            return Err(AppError::Validation("device_token must not be empty".to_string()));
        }
        return Ok(device_key(token));
    }

    req.connection_info()
        .realip_remote_addr()
        .map(ip_key)
        .ok_or_else(|| AppError::Validation("no identity on the request".to_string()))
}

/// Configures the admission routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/admission", web::post().to(check_admission));
}
