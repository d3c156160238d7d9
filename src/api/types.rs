//! API request and response types

use serde::{Deserialize, Serialize};

use crate::monitor::MonitorState;
use crate::storage::{Device, backend::DEFAULT_PAGE_LIMIT};

/// Largest page a client may request
pub const MAX_PAGE_LIMIT: usize = 1000;

/// GET / response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

/// GET /api/v1/health response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub monitor: MonitorState,
    pub subscribers: usize,
}

/// Pagination for device listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn skip(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT)
    }
}

/// GET /api/v1/devices response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
    pub count: usize,
}
