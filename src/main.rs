// =============================================================================
// STOREFRONT SERVICE - Main Entry Point
// =============================================================================
// Backend of an online store: catalogue, carts, checkout, payments, reviews,
// wishlists, support chat and a back-office API.
//
// WHAT THIS SERVICE DOES:
// - Serves the storefront JSON API under /api
// - Places orders atomically against live stock
// - Charges orders through the payment processor when one is configured
// - Caches product pages in Redis when one is configured
// - Exposes Prometheus metrics and health/readiness probes
// =============================================================================

// -----------------------------------------------------------------------------
// MODULE DECLARATIONS
// -----------------------------------------------------------------------------
mod auth;       // Tokens, password hashing, auth extractors
mod cache;      // Redis product cache
mod chat;       // Support chat hub
mod checkout;   // Order pricing and validation
mod config;     // Configuration loading
mod db;         // Store trait and PostgreSQL implementation
mod error;      // Error types
mod extract;    // JSON/path/query extractors with enveloped rejections
mod handlers;   // HTTP request handlers
mod metrics;    // Prometheus metrics
mod middleware; // Rate limiting, security headers, request metrics
mod models;     // Data structures
mod payments;   // Payment processor client
mod routes;     // Router and layers

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::JwtKeys;
use crate::cache::Cache;
use crate::chat::ChatHub;
use crate::checkout::Pricing;
use crate::config::Config;
use crate::db::{PgStore, Store};
use crate::metrics::setup_metrics;
use crate::payments::{PaymentGateway, StripeGateway};

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
// Shared by every handler through `State<Arc<AppState>>`.
pub struct AppState {
    /// Persistence (PostgreSQL in production)
    pub store: Arc<dyn Store>,

    /// Product page cache; `None` when Redis is not configured
    pub cache: Option<Cache>,

    /// Payment processor; `None` when no API key is configured
    pub payments: Option<Arc<dyn PaymentGateway>>,

    pub jwt: JwtKeys,
    pub chat: ChatHub,
    pub config: Config,

    /// Renders metrics in Prometheus format
    pub metrics_handle: PrometheusHandle,

    pub started_at: Instant,
}

impl AppState {
    pub fn pricing(&self) -> Pricing {
        Pricing {
            tax_rate: self.config.tax_rate,
            shipping_flat: self.config.shipping_flat,
        }
    }
}

// -----------------------------------------------------------------------------
// MAIN FUNCTION
// -----------------------------------------------------------------------------
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Load environment variables
    // -------------------------------------------------------------------------
    dotenvy::dotenv().ok(); // the .env file is optional

    // -------------------------------------------------------------------------
    // STEP 2: Initialize logging/tracing
    // -------------------------------------------------------------------------
    // RUST_LOG controls levels, e.g. RUST_LOG=info,storefront_service=debug
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Storefront Service...");

    // -------------------------------------------------------------------------
    // STEP 3: Load configuration
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(port = config.port, "Configuration loaded");

    // -------------------------------------------------------------------------
    // STEP 4: Set up Prometheus metrics
    // -------------------------------------------------------------------------
    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 5: Connect to PostgreSQL
    // -------------------------------------------------------------------------
    let store = PgStore::connect(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    store.run_migrations(config.seed_sample_data).await?;
    info!("Database migrations completed");

    // -------------------------------------------------------------------------
    // STEP 6: Optional integrations
    // -------------------------------------------------------------------------
    // Redis and the payment processor are optional; the service degrades
    // instead of refusing to start.
    let cache = match &config.redis_url {
        Some(url) => match Cache::connect(url).await {
            Ok(cache) => {
                info!("Connected to Redis");
                Some(cache)
            }
            Err(err) => {
                warn!(error = %err, "Redis unavailable, product cache disabled");
                None
            }
        },
        None => {
            info!("REDIS_URL not set, product cache disabled");
            None
        }
    };

    let payments: Option<Arc<dyn PaymentGateway>> = match &config.payment_api_key {
        Some(key) => {
            let gateway: Arc<dyn PaymentGateway> =
                Arc::new(StripeGateway::new(&config.payment_api_base, key)?);
            info!("Payment processor configured");
            Some(gateway)
        }
        None => {
            warn!("STRIPE_SECRET_KEY not set, online payments disabled");
            None
        }
    };

    // -------------------------------------------------------------------------
    // STEP 7: Create application state
    // -------------------------------------------------------------------------
    let port = config.port;
    let state = Arc::new(AppState {
        store: Arc::new(store),
        cache,
        payments,
        jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl),
        chat: ChatHub::default(),
        config,
        metrics_handle,
        started_at: Instant::now(),
    });

    // -------------------------------------------------------------------------
    // STEP 8: Build the router
    // -------------------------------------------------------------------------
    let app = routes::build_router(state);

    // -------------------------------------------------------------------------
    // STEP 9: Start the HTTP server
    // -------------------------------------------------------------------------
    // Peer addresses are kept for the per-IP rate limiter.
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(address = %addr, "Storefront Service is listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Storefront Service stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
