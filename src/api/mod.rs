//! REST API and WebSocket server for NetWatch
//!
//! Devices and workloads are registered over HTTP; connected WebSocket
//! clients receive a `status_update` message whenever a device goes online
//! or offline.
//!
//! ## Endpoints
//!
//! - `GET /` - Welcome message
//! - `GET /favicon.ico` - Empty 204
//! - `GET /api/v1/health` - Health check with monitor state
//! - `POST /api/v1/devices` - Register a device
//! - `GET /api/v1/devices` - List devices (`skip`, `limit`)
//! - `GET /api/v1/devices/:id` - Device with its workloads
//! - `POST /api/v1/devices/:id/workloads` - Register a workload
//! - `WS /api/v1/stream` - Live status updates

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;
#[cfg(feature = "api")]
pub mod websocket;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{DevicesResponse, HealthResponse, ListQuery, WelcomeResponse};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_addr: SocketAddr,

    /// Enable CORS for browser clients
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiSettings::default().into()
    }
}

impl From<ApiSettings> for ApiConfig {
    fn from(settings: ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind,
            enable_cors: settings.enable_cors,
        }
    }
}

/// Build the application router
#[cfg(feature = "api")]
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/", get(routes::health::welcome))
        .route("/favicon.ico", get(routes::health::favicon))
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/devices",
            post(routes::devices::create_device).get(routes::devices::list_devices),
        )
        .route("/api/v1/devices/:id", get(routes::devices::get_device))
        .route(
            "/api/v1/devices/:id/workloads",
            post(routes::devices::create_workload),
        )
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
