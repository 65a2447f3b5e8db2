use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub quota: QuotaConfig,
    pub shopify: ShopifyConfig,
    pub email: EmailConfig,
    pub cron: CronConfig,
    pub watermark: WatermarkConfig,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Quota limits and replenishment timing
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Free-tier generations per registered customer before replenishment
    pub free_tier_limit: i64,
    /// Minimum delay between quota exhaustion and automatic reset
    pub cooldown_minutes: i64,
    /// Self-expiry for queued resets that never get processed
    pub queue_ttl_hours: i64,
    /// Generations per anonymous identity (IP or device token) per window
    pub anon_limit: i64,
    /// Rolling window for the anonymous-tier counter
    pub anon_window_secs: i64,
    /// Customers fetched per collaborator page during backfill
    pub backfill_page_size: i64,
    /// Upper bound on pages per backfill run
    pub backfill_max_pages: u32,
}

/// Shopify Admin API access
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Shop domain, e.g. "my-store.myshopify.com"
    pub shop_domain: String,
    pub admin_token: String,
    pub api_version: String,
    /// Metafield namespace holding the usage count
    pub metafield_namespace: String,
    /// Metafield key holding the usage count
    pub metafield_key: String,
}

/// SMTP settings for replenishment notifications
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    /// Base URL of the storefront, used in email bodies
    pub storefront_url: String,
}

/// Scheduled-job endpoint protection
#[derive(Debug, Clone)]
pub struct CronConfig {
    /// Bearer secret required on /internal/cron/* when set
    pub secret: Option<String>,
}

/// Watermark compositing parameters
#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    /// Path to the logo asset; watermarking is disabled when unset
    pub logo_path: Option<String>,
    /// Logo size as a fraction of the shorter image dimension
    pub scale: f32,
    /// Overlay opacity, 0.0..=1.0
    pub opacity: f32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env()?,
            quota: QuotaConfig::from_env(),
            shopify: ShopifyConfig::from_env()?,
            email: EmailConfig::from_env(),
            cron: CronConfig::from_env(),
            watermark: WatermarkConfig::from_env(),
        })
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl QuotaConfig {
    /// Load quota configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            free_tier_limit: env_i64("FREE_TIER_LIMIT", 4),
            cooldown_minutes: env_i64("RESET_COOLDOWN_MINUTES", 60),
            queue_ttl_hours: env_i64("RESET_QUEUE_TTL_HOURS", 48),
            anon_limit: env_i64("ANON_LIMIT", 10),
            anon_window_secs: env_i64("ANON_WINDOW_SECS", 86400),
            backfill_page_size: env_i64("BACKFILL_PAGE_SIZE", 50),
            backfill_max_pages: env_i64("BACKFILL_MAX_PAGES", 20) as u32,
        }
    }
}

impl ShopifyConfig {
    /// Load Shopify configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let shop_domain = env::var("SHOPIFY_SHOP_DOMAIN").map_err(|_| ConfigError::MissingShopDomain)?;
        let admin_token = env::var("SHOPIFY_ADMIN_TOKEN").map_err(|_| ConfigError::MissingAdminToken)?;

        Ok(Self {
            shop_domain,
            admin_token,
            api_version: env::var("SHOPIFY_API_VERSION").unwrap_or_else(|_| "2024-10".to_string()),
            metafield_namespace: env::var("SHOPIFY_METAFIELD_NAMESPACE")
                .unwrap_or_else(|_| "custom".to_string()),
            metafield_key: env::var("SHOPIFY_METAFIELD_KEY")
                .unwrap_or_else(|_| "generation_uses".to_string()),
        })
    }
}

impl EmailConfig {
    /// Load SMTP configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .unwrap_or(587),
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            from_address: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "studio@quotaflow.local".to_string()),
            storefront_url: env::var("STOREFRONT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }
}

impl CronConfig {
    /// Load cron protection configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            secret: env::var("CRON_SECRET").ok(),
        }
    }
}

impl WatermarkConfig {
    /// Load watermark configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            logo_path: env::var("WATERMARK_LOGO_PATH").ok(),
            scale: env::var("WATERMARK_SCALE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.25),
            opacity: env::var("WATERMARK_OPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.35),
        }
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_i64("DATABASE_MAX_CONNECTIONS", 10) as u32,
            min_connections: env_i64("DATABASE_MIN_CONNECTIONS", 1) as u32,
            acquire_timeout: Duration::from_secs(env_i64("DATABASE_ACQUIRE_TIMEOUT_SECS", 5) as u64),
            idle_timeout: Duration::from_secs(env_i64("DATABASE_IDLE_TIMEOUT_SECS", 600) as u64),
            max_lifetime: Duration::from_secs(env_i64("DATABASE_MAX_LIFETIME_SECS", 1800) as u64),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
    MissingShopDomain,
    MissingAdminToken,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
            ConfigError::MissingShopDomain => {
                write!(f, "SHOPIFY_SHOP_DOMAIN environment variable is required")
            }
            ConfigError::MissingAdminToken => {
                write!(f, "SHOPIFY_ADMIN_TOKEN environment variable is required")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
