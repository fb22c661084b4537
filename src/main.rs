use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tonic::transport::{Endpoint, Server};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod clients;
mod config;
mod error;
mod metrics;
mod pb;
mod repository;
mod service;

use clients::{GrpcAccountClient, GrpcCatalogClient, GrpcIdentityClient};
use config::ServiceConfig;
use pb::ShopServiceServer;
use repository::PgShopStore;
use service::ShopOrchestrator;

/// Fully wired orchestrator as served by this binary.
type LiveShopService =
    ShopOrchestrator<GrpcIdentityClient, GrpcAccountClient, GrpcCatalogClient, PgShopStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shop_service=debug")),
        )
        .init();

    tracing::info!("🚀 Starting shop service");

    // === 1. Load configuration ===
    let config = ServiceConfig::from_env()?;

    // === 2. Connect to Postgres ===
    // The pool establishes one connection up front, so a bad DSN or an
    // unreachable database fails the boot instead of the first request.
    tracing::info!("Connecting to Postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgShopStore::new(pool));

    // === 3. Initialize Prometheus metrics ===
    tracing::info!("Initializing metrics");
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created");

    // Start metrics HTTP server in background thread
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 4. Wire up downstream service clients ===
    // Channels connect lazily; an offline downstream surfaces per-request
    // instead of preventing startup.
    let auth_channel = Endpoint::from_shared(config.auth_service_addr.clone())?.connect_lazy();
    let user_channel = Endpoint::from_shared(config.user_service_addr.clone())?.connect_lazy();
    let product_channel =
        Endpoint::from_shared(config.product_service_addr.clone())?.connect_lazy();

    let identity = Arc::new(GrpcIdentityClient::new(auth_channel));
    let accounts = Arc::new(GrpcAccountClient::new(user_channel));
    let catalog = Arc::new(GrpcCatalogClient::new(product_channel));

    tracing::info!(
        auth = %config.auth_service_addr,
        user = %config.user_service_addr,
        product = %config.product_service_addr,
        "Downstream channels created"
    );

    // === 5. Assemble the orchestrator ===
    let orchestrator = ShopOrchestrator::new(identity, accounts, catalog, store, metrics.clone());

    // === 6. Serve gRPC with health reporting ===
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ShopServiceServer<LiveShopService>>()
        .await;

    tracing::info!("🛒 Shop service listening on {}", config.grpc_addr);

    Server::builder()
        .add_service(health_service)
        .add_service(ShopServiceServer::new(orchestrator))
        .serve_with_shutdown(config.grpc_addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, draining in-flight requests");
        })
        .await?;

    tracing::info!("👋 Shop service stopped");

    Ok(())
}
