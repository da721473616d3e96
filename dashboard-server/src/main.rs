//! PRATIRAKSHA-Lite Dashboard Server
//!
//! Live backend for the threat dashboard.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PRATIRAKSHA-Lite                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  REST     │  │ WebSocket │  │  Monitor thread         │ │
//! │  │  (Axum)   │  │  /ws      │  │  simulate -> score      │ │
//! │  └─────┬─────┘  └─────▲─────┘  └────────────┬────────────┘ │
//! │        │              └── EventBus ◄────────┤              │
//! │        ▼                                    ▼              │
//! │                ┌──────────────────────┐                    │
//! │                │ SQLite threat log    │                    │
//! │                └──────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod handlers;
mod error;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pratiraksha_core::constants::{APP_VERSION, SERVICE_NAME};
use pratiraksha_core::logic::analysis_loop::{Monitor, MonitorConfig, MonitorHandle};
use pratiraksha_core::logic::events::EventBus;
use pratiraksha_core::logic::model::{ModelInfo, ThreatDetector};
use pratiraksha_core::logic::threat_log::ThreatStore;

pub use error::{AppError, AppResult};

const DEFAULT_LOG_FILTER: &str = "pratiraksha_server=debug,pratiraksha_core=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(config.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("{} v{} starting...", SERVICE_NAME, APP_VERSION);

    // Threat log
    let store = ThreatStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    tracing::info!("Database initialized");

    let model_info = ModelInfo::load_or_default(&config.model_info_path);
    tracing::info!("Model info loaded: {}", model_info.model_architecture);

    let detector = match ThreatDetector::load(&config.model_path, Some(&model_info)) {
        Ok(detector) => Some(Arc::new(detector)),
        Err(e) => {
            tracing::warn!("GCN model unavailable ({}), using fallback scoring", e);
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        store: Arc::new(store),
        bus: EventBus::new(config.event_capacity),
        detector,
        model_info: Arc::new(model_info),
    };

    let monitor = start_monitor(&state)?;

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = monitor {
        tokio::task::spawn_blocking(move || handle.stop()).await?;
    }
    tracing::info!("Server shutdown gracefully");
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub store: Arc<ThreatStore>,
    pub bus: EventBus,
    pub detector: Option<Arc<ThreatDetector>>,
    pub model_info: Arc<ModelInfo>,
}

fn start_monitor(state: &AppState) -> anyhow::Result<Option<MonitorHandle>> {
    if !state.config.monitor_enabled {
        tracing::info!("Network monitor disabled");
        return Ok(None);
    }

    let (min_delay_secs, max_delay_secs) = state.config.monitor_delay;
    let monitor = Monitor::new(
        MonitorConfig {
            min_delay_secs,
            max_delay_secs,
            ..MonitorConfig::from_env()
        },
        Arc::clone(&state.store),
        state.bus.clone(),
        state.detector.clone(),
    );

    let handle = monitor.start().context("spawning monitor thread")?;
    tracing::info!("Network monitoring thread started");
    Ok(Some(handle))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/stats", get(handlers::stats::get))
        .route("/api/threats", get(handlers::threats::list))
        .route("/api/model", get(handlers::model::get))
        .route("/api/detect", post(handlers::detect::detect))
        .route("/ws", get(handlers::ws::upgrade))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
