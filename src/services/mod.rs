pub mod admission;
pub mod backfill;
pub mod notification;
pub mod reconcile;
pub mod retry;
pub mod usage;
pub mod watermark;

pub use admission::{device_key, ip_key, AdmissionDecision, AdmissionService};
pub use backfill::{BackfillService, BackfillSummary};
pub use reconcile::{ReconcileService, ReconcileSummary};
pub use usage::UsageService;
pub use watermark::{tile_watermark, WatermarkOptions};
