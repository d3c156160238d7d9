//! Health check, welcome and favicon endpoints

use axum::{Json, extract::State, http::StatusCode};

use crate::api::{
    state::ApiState,
    types::{HealthResponse, WelcomeResponse},
};

/// GET /
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to NetWatch API".to_string(),
    })
}

/// GET /favicon.ico
///
/// Browsers ask for it on every visit; answer without a body instead of 404.
pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /api/v1/health
///
/// Returns a health check response with the monitor state
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        monitor: state.lifecycle.state(),
        subscribers: state.registry.len().await,
    })
}
