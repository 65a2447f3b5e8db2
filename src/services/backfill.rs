//! Repair sweep for reset rows the request path failed to queue.
//!
//! The request path queues resets fire-and-forget, so a deploy or crash
//! mid-request can lose the write. This sweep pages through every customer
//! and re-creates the missing rows. It never overwrites an existing row and
//! is safe to run arbitrarily often.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::QuotaConfig;
use crate::error::AppResult;
use crate::models::{QuotaValue, ResetSnapshot, ResetSource};
use crate::shopify::CustomerDirectory;
use crate::store::ResetQueue;

/// Operational summary returned to the scheduler
#[derive(Debug, Default, Serialize)]
pub struct BackfillSummary {
    pub pages: u32,
    pub scanned: usize,
    /// Missing rows re-created this run
    pub created: usize,
    /// Over-limit customers whose row already existed
    pub already_queued: usize,
    pub errors: Vec<String>,
}

pub struct BackfillService;

impl BackfillService {
    pub async fn run(
        directory: &dyn CustomerDirectory,
        queue: &dyn ResetQueue,
        quota: &QuotaConfig,
        now: DateTime<Utc>,
    ) -> AppResult<BackfillSummary> {
        let mut summary = BackfillSummary::default();
        let mut cursor: Option<String> = None;
        let ttl = Duration::hours(quota.queue_ttl_hours);

        // Page budget bounds one run against a large customer base; anything
        // left over is picked up by the next scheduled run
        for _ in 0..quota.backfill_max_pages {
            let page = match directory
                .list_customers(cursor.as_deref(), quota.backfill_page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    summary.errors.push(format!("page fetch: {}", e));
                    break;
                }
            };
            summary.pages += 1;

            for customer in &page.customers {
                summary.scanned += 1;

                let value = match QuotaValue::parse_opt(customer.quota_raw.as_deref()) {
                    Ok(value) => value,
                    Err(e) => {
                        summary.errors.push(format!("{}: {}", customer.id, e));
                        continue;
                    }
                };

                if value.total < quota.free_tier_limit {
                    continue;
                }

                let snapshot = ResetSnapshot {
                    reached_at: now,
                    total_used: value.total,
                    total_limit: quota.free_tier_limit,
                    added_by: ResetSource::Backfill,
                };

                match queue.enqueue_if_absent(&customer.id, &snapshot, ttl).await {
                    Ok(true) => summary.created += 1,
                    Ok(false) => summary.already_queued += 1,
                    Err(e) => summary.errors.push(format!("{}: {}", customer.id, e)),
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    cursor = None;
                    break;
                }
            }
        }

        if cursor.is_some() {
            log::info!("Backfill stopped at its page budget; the next run continues the sweep");
        }

        log::info!(
            "Backfill: {} scanned over {} pages, {} created, {} already queued, {} errors",
            summary.scanned,
            summary.pages,
            summary.created,
            summary.already_queued,
            summary.errors.len()
        );

        Ok(summary)
    }
}
