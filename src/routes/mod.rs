pub mod admission;
pub mod cron;
pub mod health;
pub mod usage;
pub mod watermark;
