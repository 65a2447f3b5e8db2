use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which path queued a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetSource {
    /// The generation request path, at the moment the limit was reached
    Request,
    /// The repair sweep that re-creates entries the request path lost
    Backfill,
}

/// Snapshot written when a customer first exhausts their quota.
///
/// Stored as the JSON payload of a pending reset. `reached_at` drives the
/// cooldown and must never be refreshed by later exhausted requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetSnapshot {
    pub reached_at: DateTime<Utc>,
    pub total_used: i64,
    pub total_limit: i64,
    pub added_by: ResetSource,
}

/// A queued "customer exhausted their quota" row awaiting reconciliation
#[derive(Debug, Clone, FromRow)]
pub struct PendingReset {
    pub customer_id: String,
    pub payload: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

impl PendingReset {
    /// Decodes the snapshot payload; failure marks the row as corrupt
    pub fn snapshot(&self) -> Result<ResetSnapshot, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Write-once audit record of a delivered replenishment notification
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SentNotification {
    pub customer_id: String,
    pub email: String,
    pub provider_message_id: String,
    pub sent_at: DateTime<Utc>,
}
