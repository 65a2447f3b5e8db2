//! PostgreSQL-backed stores.
//!
//! The counter increment and the conditional queue insert are each a single
//! statement, so their atomicity holds across processes without application
//! locks.

use async_trait::async_trait;
use chrono::Duration;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{PendingReset, ResetSnapshot, SentNotification};
use crate::store::{CounterStore, NotificationLog, ResetQueue};

/// Counter store on the `counters` table
pub struct PgCounterStore {
    pool: DbPool,
}

impl PgCounterStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment(&self, key: &str, ttl: Duration) -> AppResult<i64> {
        // Expired rows restart at 1 with a fresh TTL; live rows keep their
        // original expiry so the window is measured from the first hit.
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (key, value, expires_at)
            VALUES ($1, 1, now() + make_interval(secs => $2::double precision))
            ON CONFLICT (key) DO UPDATE
            SET value = CASE
                    WHEN counters.expires_at <= now() THEN 1
                    ELSE counters.value + 1
                END,
                expires_at = CASE
                    WHEN counters.expires_at <= now()
                        THEN now() + make_interval(secs => $2::double precision)
                    ELSE counters.expires_at
                END
            RETURNING value
            "#,
        )
        .bind(key)
        .bind(ttl.num_seconds())
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    async fn read(&self, key: &str) -> AppResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT value FROM counters WHERE key = $1 AND expires_at > now()")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.unwrap_or(0))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Reset queue on the `pending_resets` table
pub struct PgResetQueue {
    pool: DbPool,
}

impl PgResetQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetQueue for PgResetQueue {
    async fn enqueue_if_absent(
        &self,
        customer_id: &str,
        snapshot: &ResetSnapshot,
        ttl: Duration,
    ) -> AppResult<bool> {
        let payload = serde_json::to_value(snapshot)
            .map_err(|e| crate::error::AppError::Internal(format!("snapshot encoding: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO pending_resets (customer_id, payload, expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3::double precision))
            ON CONFLICT (customer_id) DO NOTHING
            "#,
        )
        .bind(customer_id)
        .bind(&payload)
        .bind(ttl.num_seconds())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_all(&self) -> AppResult<Vec<PendingReset>> {
        // Lazy TTL enforcement keeps abandoned rows from accumulating
        sqlx::query("DELETE FROM pending_resets WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, PendingReset>(
            r#"
            SELECT customer_id, payload, expires_at
            FROM pending_resets
            ORDER BY expires_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn remove(&self, customer_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM pending_resets WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Notification audit log on the `sent_notifications` table
pub struct PgNotificationLog {
    pool: DbPool,
}

impl PgNotificationLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLog for PgNotificationLog {
    async fn record(&self, notification: &SentNotification, ttl: Duration) -> AppResult<()> {
        sqlx::query("DELETE FROM sent_notifications WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO sent_notifications
                (customer_id, email, provider_message_id, sent_at, expires_at)
            VALUES ($1, $2, $3, $4, now() + make_interval(secs => $5::double precision))
            "#,
        )
        .bind(&notification.customer_id)
        .bind(&notification.email)
        .bind(&notification.provider_message_id)
        .bind(notification.sent_at)
        .bind(ttl.num_seconds())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
