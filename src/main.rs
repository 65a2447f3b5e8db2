use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use quotaflow::config;
use quotaflow::db;
use quotaflow::routes;
use quotaflow::services::notification::{Mailer, SmtpMailer};
use quotaflow::shopify::{CustomerDirectory, ShopifyAdminClient};
use quotaflow::state::AppState;
use quotaflow::store::{
    CounterStore, NotificationLog, PgCounterStore, PgNotificationLog, PgResetQueue, ResetQueue,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Starting Quotaflow server on {}:{}", config.host, config.port);

    // Create database pool
    let db_pool = db::create_pool(&config.database).await.map_err(|e| {
        log::error!("Database pool error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Run migrations
    db::run_migrations(&db_pool).await.map_err(|e| {
        log::error!("Migration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Wire production backings behind the trait seams
    let counters: Arc<dyn CounterStore> = Arc::new(PgCounterStore::new(db_pool.clone()));
    let queue: Arc<dyn ResetQueue> = Arc::new(PgResetQueue::new(db_pool.clone()));
    let audit: Arc<dyn NotificationLog> = Arc::new(PgNotificationLog::new(db_pool.clone()));
    let directory: Arc<dyn CustomerDirectory> =
        Arc::new(ShopifyAdminClient::new(config.shopify.clone()).map_err(|e| {
            log::error!("Shopify client error: {}", e);
            std::io::Error::other(e.to_string())
        })?);
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(config.email.clone()));

    let watermark_logo = load_watermark_logo(config.watermark.logo_path.as_deref());

    if config.cron.secret.is_none() {
        log::warn!("CRON_SECRET not set; scheduled endpoints are unprotected");
    }
    if config.email.smtp_host.is_none() {
        log::warn!("SMTP_HOST not set; replenishment notifications will fail and retry");
    }

    let state = AppState {
        config: config.clone(),
        counters,
        queue,
        audit,
        directory,
        mailer,
        watermark_logo,
    };

    // Clone values for the closure
    let host = config.host.clone();
    let port = config.port;

    let server = HttpServer::new(move || {
        // CORS configuration - permissive for storefront calls
        // The customizer widget runs on the shop's domain and calls admission
        // and usage endpoints directly from the browser.
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            // Share state with all handlers
            .app_data(web::Data::new(state.clone()))
            // Generated images can be a few megabytes
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024))
            // Middleware
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(cors)
            // Health check routes
            .configure(routes::health::configure)
            // Quota API
            .configure(routes::admission::configure)
            .configure(routes::usage::configure)
            .configure(routes::watermark::configure)
            // Scheduled jobs (platform cron)
            .configure(routes::cron::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(30)
    .run();

    // Spawn graceful shutdown handler
    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}

/// Reads the watermark logo asset; a missing asset disables watermarking
fn load_watermark_logo(path: Option<&str>) -> Option<Arc<Vec<u8>>> {
    let path = path?;
    match std::fs::read(path) {
        Ok(bytes) => {
            log::info!("Watermark logo loaded from {} ({} bytes)", path, bytes.len());
            Some(Arc::new(bytes))
        }
        Err(e) => {
            log::warn!(
                "Failed to read watermark logo {}: {}; watermarking disabled",
                path,
                e
            );
            None
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                // Wait forever if signal handler fails
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
