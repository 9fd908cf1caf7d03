use anyhow::{Context, Result};
use sensor_manager::api::{create_router, ApiState};
use sensor_manager::registry::{build_adapters, AdapterDeps};
use sensor_manager::{AuthorizationBoard, SensorManager};
use sensorpoll::config::load_config;
use sensorpoll::http::ReqwestClient;
use sensorpoll::oauth::StateManager;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_manager=info,sensorpoll=info".into()),
        )
        .init();

    info!("Sensor Manager starting...");

    let config_path =
        std::env::var("SENSORPOLL_CONFIG").unwrap_or_else(|_| "sensorpoll.toml".to_string());
    let config = load_config(&config_path)?;

    info!(
        config_path = %config_path,
        config_dir = %config.general.config_dir.display(),
        api_port = config.general.api_port,
        withings = config.withings.is_some(),
        questrade = config.questrade.is_some(),
        teksavvy = config.teksavvy.is_some(),
        "Configuration loaded"
    );

    let http = Arc::new(
        ReqwestClient::new(config.general.http_timeout()).context("Failed to build HTTP client")?,
    );
    let board = Arc::new(AuthorizationBoard::new());
    let states = StateManager::default();

    let deps = AdapterDeps {
        http,
        prompt: board.clone(),
        states: states.clone(),
    };
    let registry = build_adapters(&config, &deps);

    let manager = Arc::new(SensorManager::new(registry.adapters, states).with_discoveries(registry.discoveries));
    let ready = manager.start().await;
    info!(adapters_ready = ready, "Sensor manager started");

    // Start HTTP API server
    let router = create_router(ApiState {
        manager: Arc::clone(&manager),
        board,
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.general.api_port))
        .await
        .context("Failed to bind sensor API port")?;
    info!(port = config.general.api_port, "Sensor API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Sensor API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Graceful shutdown
    server_handle.abort();
    manager.shutdown().await;
    info!("Sensor manager stopped");

    Ok(())
}
