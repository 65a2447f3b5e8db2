//! In-memory stores.
//!
//! Process-local and lost on restart: the acknowledged weaker guarantee,
//! acceptable for the auxiliary anonymous-tier limiter and for tests. The
//! service-layer code never knows which backing it runs against.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::AppResult;
use crate::models::{PendingReset, ResetSnapshot, SentNotification};
use crate::store::{CounterStore, NotificationLog, ResetQueue};

/// Counter store on a mutex-guarded map with lazy expiry
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
}

struct CounterEntry {
    value: i64,
    expires_at: Instant,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> AppResult<i64> {
        let ttl = ttl.to_std().unwrap_or_default();
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("counter map poisoned");

        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if e.expires_at <= now {
                    e.value = 1;
                    e.expires_at = now + ttl;
                } else {
                    e.value += 1;
                }
            })
            .or_insert(CounterEntry {
                value: 1,
                expires_at: now + ttl,
            });

        Ok(entry.value)
    }

    async fn read(&self, key: &str) -> AppResult<i64> {
        let now = Instant::now();
        let entries = self.entries.lock().expect("counter map poisoned");

        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value)
            .unwrap_or(0))
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Reset queue on a mutex-guarded map
#[derive(Default)]
pub struct MemoryResetQueue {
    rows: Mutex<HashMap<String, PendingReset>>,
}

impl MemoryResetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: injects a raw row, bypassing snapshot encoding
    pub fn insert_raw(&self, row: PendingReset) {
        let mut rows = self.rows.lock().expect("queue map poisoned");
        rows.insert(row.customer_id.clone(), row);
    }
}

#[async_trait]
impl ResetQueue for MemoryResetQueue {
    async fn enqueue_if_absent(
        &self,
        customer_id: &str,
        snapshot: &ResetSnapshot,
        ttl: Duration,
    ) -> AppResult<bool> {
        let now = Utc::now();
        let mut rows = self.rows.lock().expect("queue map poisoned");

        if let Some(existing) = rows.get(customer_id) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        let payload = serde_json::to_value(snapshot)
            .map_err(|e| crate::error::AppError::Internal(format!("snapshot encoding: {}", e)))?;

        rows.insert(
            customer_id.to_string(),
            PendingReset {
                customer_id: customer_id.to_string(),
                payload,
                expires_at: now + ttl,
            },
        );

        Ok(true)
    }

    async fn list_all(&self) -> AppResult<Vec<PendingReset>> {
        let now = Utc::now();
        let mut rows = self.rows.lock().expect("queue map poisoned");

        rows.retain(|_, row| row.expires_at > now);

        let mut all: Vec<PendingReset> = rows.values().cloned().collect();
        all.sort_by_key(|row| row.expires_at);
        Ok(all)
    }

    async fn remove(&self, customer_id: &str) -> AppResult<()> {
        let mut rows = self.rows.lock().expect("queue map poisoned");
        rows.remove(customer_id);
        Ok(())
    }
}

/// Notification audit log kept in memory, with a test accessor
#[derive(Default)]
pub struct MemoryNotificationLog {
    rows: Mutex<Vec<SentNotification>>,
}

impl MemoryNotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<SentNotification> {
        self.rows.lock().expect("audit log poisoned").clone()
    }
}

#[async_trait]
impl NotificationLog for MemoryNotificationLog {
    async fn record(&self, notification: &SentNotification, _ttl: Duration) -> AppResult<()> {
        let mut rows = self.rows.lock().expect("audit log poisoned");
        rows.push(notification.clone());
        Ok(())
    }
}
