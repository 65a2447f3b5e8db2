//! Customer-tier usage bookkeeping against the collaborator store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::config::QuotaConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Customer, QuotaValue, ResetSnapshot, ResetSource};
use crate::shopify::CustomerDirectory;
use crate::store::ResetQueue;

pub struct UsageService;

impl UsageService {
    /// Reads and normalizes the customer's usage-count field.
    /// An absent field is a fresh quota; an unreadable one is a collaborator error.
    pub async fn current_usage(
        directory: &dyn CustomerDirectory,
        customer_id: &str,
    ) -> AppResult<(Customer, QuotaValue)> {
        let customer = directory.fetch_customer(customer_id).await?;
        let value = QuotaValue::parse_opt(customer.quota_raw.as_deref())
            .map_err(|e| AppError::Collaborator(e.to_string()))?;

        Ok((customer, value))
    }

    /// Records one successful generation and returns the new count.
    ///
    /// Read-then-write: two racing generations from the same customer can lose
    /// one increment. Accepted — generation latency is seconds, and the cost
    /// of the race is a single free generation.
    pub async fn record_usage(
        directory: &dyn CustomerDirectory,
        queue: &Arc<dyn ResetQueue>,
        quota: &QuotaConfig,
        customer_id: &str,
    ) -> AppResult<i64> {
        let (_, value) = Self::current_usage(directory, customer_id).await?;
        let updated = value.with_total(value.total + 1);

        directory
            .write_quota_field(customer_id, &updated.to_wire())
            .await?;

        if updated.total >= quota.free_tier_limit {
            Self::queue_reset(queue, quota, customer_id, updated.total);
        }

        Ok(updated.total)
    }

    /// Queues the delayed reset for a customer who just hit the limit.
    ///
    /// Best-effort and non-blocking: the generation response never waits on
    /// this write, and a lost one is repaired by the backfill sweep.
    fn queue_reset(
        queue: &Arc<dyn ResetQueue>,
        quota: &QuotaConfig,
        customer_id: &str,
        total_used: i64,
    ) {
        let queue = Arc::clone(queue);
        let customer_id = customer_id.to_string();
        let ttl = Duration::hours(quota.queue_ttl_hours);
        let snapshot = ResetSnapshot {
            reached_at: Utc::now(),
            total_used,
            total_limit: quota.free_tier_limit,
            added_by: ResetSource::Request,
        };

        tokio::spawn(async move {
            match queue.enqueue_if_absent(&customer_id, &snapshot, ttl).await {
                Ok(true) => {
                    log::info!("Customer {} exhausted their quota, reset queued", customer_id)
                }
                Ok(false) => log::debug!("Reset already queued for {}", customer_id),
                Err(e) => log::error!("Failed to queue reset for {}: {}", customer_id, e),
            }
        });
    }
}
