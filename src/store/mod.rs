//! Storage seams for the quota subsystem.
//!
//! Every durable concern sits behind an object-safe trait so the same service
//! code runs against PostgreSQL in production and in-memory fakes in tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::AppResult;
use crate::models::{PendingReset, ResetSnapshot, SentNotification};

pub use memory::{MemoryCounterStore, MemoryNotificationLog, MemoryResetQueue};
pub use postgres::{PgCounterStore, PgNotificationLog, PgResetQueue};

/// Atomic per-key counter with expiry, scoped by caller-supplied keys
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments and returns the new value.
    ///
    /// The first increment for a key initializes it to 1 and stamps the TTL;
    /// an expired key restarts at 1 with a fresh TTL. Atomicity under
    /// concurrent callers with the same key is the store's responsibility.
    async fn increment(&self, key: &str, ttl: Duration) -> AppResult<i64>;

    /// Non-atomic snapshot of the current value; 0 for absent or expired keys
    async fn read(&self, key: &str) -> AppResult<i64>;

    /// Readiness probe for the backing store
    async fn ping(&self) -> bool;
}

/// Durable queue of customers awaiting a quota reset
#[async_trait]
pub trait ResetQueue: Send + Sync {
    /// Writes a row only if none exists for the customer.
    ///
    /// Returns true when a new row was created. An existing row is left
    /// untouched so the cooldown is measured from the first exhaustion.
    async fn enqueue_if_absent(
        &self,
        customer_id: &str,
        snapshot: &ResetSnapshot,
        ttl: Duration,
    ) -> AppResult<bool>;

    /// Full scan of unexpired rows; expired rows are purged opportunistically
    async fn list_all(&self) -> AppResult<Vec<PendingReset>>;

    /// Idempotent delete
    async fn remove(&self, customer_id: &str) -> AppResult<()>;
}

/// Write-once audit log of delivered replenishment notifications
#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn record(&self, notification: &SentNotification, ttl: Duration) -> AppResult<()>;
}
