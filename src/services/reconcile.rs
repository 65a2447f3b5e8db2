//! Scheduled reconciliation of queued quota resets.
//!
//! For every queued row past its cooldown: reset the customer's usage count
//! to zero in the encoding it was stored in, notify the customer if they have
//! an address, and remove the row only once nothing more is owed. A row whose
//! notification fails stays queued for the next run; resetting to zero twice
//! is idempotent, so the repeated reset is harmless.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::QuotaConfig;
use crate::error::AppResult;
use crate::models::{QuotaValue, SentNotification};
use crate::services::notification::Mailer;
use crate::shopify::CustomerDirectory;
use crate::store::{NotificationLog, ResetQueue};

/// Audit rows outlive the queue rows they describe
const AUDIT_TTL_DAYS: i64 = 30;

/// Operational summary returned to the scheduler
#[derive(Debug, Default, Serialize)]
pub struct ReconcileSummary {
    pub scanned: usize,
    /// Rows still inside their cooldown, left untouched
    pub waiting: usize,
    /// Usage counts reset to zero this run
    pub reset: usize,
    /// Replenishment emails delivered
    pub notified: usize,
    /// Customers with no contact address, nothing owed
    pub no_contact: usize,
    /// Rows removed from the queue
    pub removed: usize,
    /// Unparseable rows dropped
    pub corrupt: usize,
    pub errors: Vec<String>,
}

pub struct ReconcileService;

impl ReconcileService {
    pub async fn run(
        queue: &dyn ResetQueue,
        directory: &dyn CustomerDirectory,
        mailer: &dyn Mailer,
        audit: &dyn NotificationLog,
        quota: &QuotaConfig,
        now: DateTime<Utc>,
    ) -> AppResult<ReconcileSummary> {
        let rows = queue.list_all().await?;
        let cooldown = Duration::minutes(quota.cooldown_minutes);

        let mut summary = ReconcileSummary {
            scanned: rows.len(),
            ..Default::default()
        };

        for row in rows {
            let snapshot = match row.snapshot() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // Poison rows would otherwise be retried forever
                    log::warn!("Dropping corrupt reset row for {}: {}", row.customer_id, e);
                    match queue.remove(&row.customer_id).await {
                        Ok(()) => summary.corrupt += 1,
                        Err(e) => summary.errors.push(format!("{}: {}", row.customer_id, e)),
                    }
                    continue;
                }
            };

            if now - snapshot.reached_at < cooldown {
                summary.waiting += 1;
                continue;
            }

            let customer = match directory.fetch_customer(&row.customer_id).await {
                Ok(customer) => customer,
                Err(e) => {
                    summary.errors.push(format!("{}: {}", row.customer_id, e));
                    continue;
                }
            };

            let value = match QuotaValue::parse_opt(customer.quota_raw.as_deref()) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "Unreadable usage count for {}, resetting in legacy encoding: {}",
                        row.customer_id,
                        e
                    );
                    QuotaValue::fresh()
                }
            };

            if let Err(e) = directory
                .write_quota_field(&row.customer_id, &value.with_total(0).to_wire())
                .await
            {
                summary.errors.push(format!("{}: {}", row.customer_id, e));
                continue;
            }
            summary.reset += 1;

            match customer.email {
                None => {
                    // No address on file means no notification is owed
                    match queue.remove(&row.customer_id).await {
                        Ok(()) => {
                            summary.no_contact += 1;
                            summary.removed += 1;
                        }
                        Err(e) => summary.errors.push(format!("{}: {}", row.customer_id, e)),
                    }
                }
                Some(email) => {
                    match mailer.send_replenished(&email, quota.free_tier_limit).await {
                        Ok(message_id) => {
                            let notification = SentNotification {
                                customer_id: row.customer_id.clone(),
                                email,
                                provider_message_id: message_id,
                                sent_at: Utc::now(),
                            };
                            // Observability only; a failed audit write never
                            // re-queues a delivered notification
                            if let Err(e) = audit
                                .record(&notification, Duration::days(AUDIT_TTL_DAYS))
                                .await
                            {
                                log::warn!(
                                    "Audit write failed for {}: {}",
                                    row.customer_id,
                                    e
                                );
                            }

                            match queue.remove(&row.customer_id).await {
                                Ok(()) => {
                                    summary.notified += 1;
                                    summary.removed += 1;
                                }
                                Err(e) => {
                                    summary.errors.push(format!("{}: {}", row.customer_id, e))
                                }
                            }
                        }
                        Err(e) => {
                            // Quota is already reset; the row stays queued so
                            // the next run retries the notification
                            summary.errors.push(format!("{}: {}", row.customer_id, e));
                        }
                    }
                }
            }
        }

        log::info!(
            "Reconciliation: {} scanned, {} waiting, {} reset, {} notified, {} errors",
            summary.scanned,
            summary.waiting,
            summary.reset,
            summary.notified,
            summary.errors.len()
        );

        Ok(summary)
    }
}
