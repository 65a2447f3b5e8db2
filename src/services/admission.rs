//! Admission decisions ahead of an expensive generation call.
//!
//! The customer tier is authoritative and fails closed; the anonymous tier
//! (IP or device token) is a best-effort dam and fails open.

use crate::config::QuotaConfig;
use crate::error::{AppError, AppResult};
use crate::models::is_allowed;
use crate::services::usage::UsageService;
use crate::shopify::CustomerDirectory;
use crate::store::CounterStore;

/// Counter key for an IP-scoped generation count
pub fn ip_key(addr: &str) -> String {
    format!("ip:{}:generations", addr)
}

/// Counter key for a device-token-scoped generation count
pub fn device_key(token: &str) -> String {
    format!("device:{}:generations", token)
}

/// Outcome of an admission check
#[derive(Debug)]
pub enum AdmissionDecision {
    Allowed {
        remaining: i64,
    },
    Denied {
        used: i64,
        limit: i64,
        /// Window hint for anonymous denials; customer denials wait on the
        /// replenishment cycle instead
        retry_after_secs: Option<i64>,
    },
}

pub struct AdmissionService;

impl AdmissionService {
    /// Authoritative customer-tier check.
    ///
    /// Fails closed: if the collaborator store cannot be reached, the request
    /// is denied rather than silently unmetered.
    pub async fn check_customer(
        directory: &dyn CustomerDirectory,
        quota: &QuotaConfig,
        customer_id: &str,
    ) -> AppResult<AdmissionDecision> {
        let (_, value) = UsageService::current_usage(directory, customer_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(msg) => AppError::NotFound(msg),
                other => {
                    log::error!("Customer quota check failed: {}", other);
                    AppError::Unavailable("customer quota check unavailable".to_string())
                }
            })?;

        if is_allowed(value.total, quota.free_tier_limit) {
            Ok(AdmissionDecision::Allowed {
                remaining: quota.free_tier_limit - value.total,
            })
        } else {
            Ok(AdmissionDecision::Denied {
                used: value.total,
                limit: quota.free_tier_limit,
                retry_after_secs: None,
            })
        }
    }

    /// Best-effort anonymous-tier check.
    ///
    /// Fails open: a broken counter store must not block traffic that the
    /// authoritative tier would have allowed.
    pub async fn check_anonymous(
        counters: &dyn CounterStore,
        quota: &QuotaConfig,
        key: &str,
    ) -> AdmissionDecision {
        let used = match counters.read(key).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Anonymous counter read failed, allowing request: {}", e);
                return AdmissionDecision::Allowed {
                    remaining: quota.anon_limit,
                };
            }
        };

        if used < quota.anon_limit {
            AdmissionDecision::Allowed {
                remaining: quota.anon_limit - used,
            }
        } else {
            AdmissionDecision::Denied {
                used,
                limit: quota.anon_limit,
                retry_after_secs: Some(quota.anon_window_secs),
            }
        }
    }
}
