use std::sync::Arc;

use crate::config::Config;
use crate::services::notification::Mailer;
use crate::shopify::CustomerDirectory;
use crate::store::{CounterStore, NotificationLog, ResetQueue};

/// Shared handler state: configuration plus the storage and collaborator seams.
///
/// Everything behind an Arc'd trait object so production wires PostgreSQL,
/// Shopify, and SMTP while tests wire in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub counters: Arc<dyn CounterStore>,
    pub queue: Arc<dyn ResetQueue>,
    pub audit: Arc<dyn NotificationLog>,
    pub directory: Arc<dyn CustomerDirectory>,
    pub mailer: Arc<dyn Mailer>,
    /// Logo bytes for the watermark path; None disables it
    pub watermark_logo: Option<Arc<Vec<u8>>>,
}
