//!
//! OCPP 1.6 central system gateway for EV charging stations.
//! Reads configuration from TOML file (~/.config/gridlink-ocpp/config.toml).

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use gridlink_ocpp::application::discovery::DiscoveryTiming;
use gridlink_ocpp::application::telemetry::MeterPublisher;
use gridlink_ocpp::infrastructure::cache::CacheGateway;
use gridlink_ocpp::infrastructure::storage::StorageGateway;
use gridlink_ocpp::interfaces::http::ApiState;
use gridlink_ocpp::support::shutdown::GatewayShutdown;
use gridlink_ocpp::{
    create_api_router, create_command_service, default_config_path, AppConfig, GatewayCore,
    InMemoryCache, InMemoryStorage, MeterStreamHub, OcppServer, SessionRegistry,
    TransactionCoordinator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("GRIDLINK_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let config = match AppConfig::load(&config_path) {
        Ok(config) => {
            init_logging(&config.logging.level);
            info!("Configuration loaded from {}", config_path.display());
            config
        }
        Err(e) => {
            let config = AppConfig::default();
            init_logging(&config.logging.level);
            error!("Failed to load config: {}. Using defaults.", e);
            config
        }
    };

    info!("Starting Gridlink OCPP central system...");

    // ── Prometheus recorder (before any metrics calls) ─────────
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("Prometheus metrics recorder installed");

    // ── Gateways ───────────────────────────────────────────────
    // In-memory reference implementations; production deployments swap
    // these for database/Redis-backed gateways behind the same traits.
    let storage: Arc<dyn StorageGateway> = Arc::new(InMemoryStorage::new());
    let cache: Arc<dyn CacheGateway> = Arc::new(InMemoryCache::new());

    // ── Core services ──────────────────────────────────────────
    let coordinator = Arc::new(TransactionCoordinator::new(storage.clone()));
    let hub = Arc::new(MeterStreamHub::new());
    let publisher: Arc<dyn MeterPublisher> = hub.clone();

    let session_registry = SessionRegistry::shared();
    let command_service = create_command_service(session_registry.clone(), coordinator.clone());

    let core = Arc::new(GatewayCore {
        storage: storage.clone(),
        cache: cache.clone(),
        coordinator: coordinator.clone(),
        publisher,
        heartbeat_interval: config.ocpp.heartbeat_interval,
        call_timeout: Duration::from_secs(config.ocpp.call_timeout_secs),
    });

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = GatewayShutdown::new(config.server.shutdown_timeout);
    shutdown.spawn_signal_listener();

    // ── Heartbeat sweeper ──────────────────────────────────────
    session_registry.start_sweeper(
        Duration::from_secs(config.ocpp.sweep_interval_secs),
        shutdown.token(),
    );

    // ── WebSocket server ───────────────────────────────────────
    let ws_server = OcppServer::new(config.ws_addr(), session_registry.clone(), core)
        .with_shutdown(shutdown.handle());

    // ── REST API server ────────────────────────────────────────
    let api_router = create_api_router(ApiState {
        registry: session_registry.clone(),
        commands: command_service,
        storage,
        cache,
        hub,
        discovery_timing: DiscoveryTiming::default(),
        metrics: prometheus_handle,
    });

    let api_addr = config.api_addr();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("REST API server listening on http://{}", api_addr);

    let api_stop = shutdown.token();
    let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
        api_stop.stopped().await;
        info!("REST API server received shutdown signal");
    });

    // ── Run both servers ───────────────────────────────────────
    info!("All servers started. Press Ctrl+C to shutdown gracefully.");

    let ws_task = tokio::spawn(async move { ws_server.run().await });
    let api_task = tokio::spawn(async move { api_server.await });

    tokio::select! {
        result = ws_task => {
            match result {
                Ok(Ok(())) => info!("WebSocket server stopped"),
                Ok(Err(e)) => error!("WebSocket server error: {}", e),
                Err(e) => error!("WebSocket server task panicked: {}", e),
            }
        }
        result = api_task => {
            match result {
                Ok(Ok(())) => info!("REST API server stopped"),
                Ok(Err(e)) => error!("REST API server error: {}", e),
                Err(e) => error!("REST API server task panicked: {}", e),
            }
        }
    }

    // Intake has stopped; give connected charge points the grace period
    // to fail their pending calls and apply disconnect side effects
    shutdown.trigger();
    if shutdown.wait_drained().await {
        info!("All charge point sessions drained");
    } else {
        warn!("Session drain timed out, exiting with sessions still open");
    }

    info!("Gridlink OCPP central system shutdown complete");
    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}
