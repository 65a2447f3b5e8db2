//! Replenishment notification sending.
//!
//! A single trait seam so production uses SMTP and tests use a programmable
//! fake. The sender distinguishes provider rate limiting from hard failures;
//! only the former is worth retrying.

pub mod email;

use async_trait::async_trait;

pub use email::SmtpMailer;

/// A notification delivery failure
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Provider pushed back; the caller should back off and retry
    #[error("notification provider rate limited: {0}")]
    RateLimited(String),

    /// Hard failure, not worth retrying
    #[error("notification send failed: {0}")]
    Failed(String),
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::RateLimited(_))
    }
}

/// Sender of "credits replenished" notifications
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the replenishment notice, returning the provider-assigned
    /// message id on success
    async fn send_replenished(&self, to: &str, total_limit: i64) -> Result<String, SendError>;
}
