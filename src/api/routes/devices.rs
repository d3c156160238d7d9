//! Device and workload registration endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{DevicesResponse, ListQuery},
    },
    storage::{Device, DeviceId, NewDevice, NewWorkload, Workload},
};

/// POST /api/v1/devices
///
/// Register a device. The MAC address must not be registered yet.
pub async fn create_device(
    State(state): State<ApiState>,
    Json(new): Json<NewDevice>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    if state.store.get_device_by_mac(&new.mac_address).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "device with mac address {} already registered",
            new.mac_address
        )));
    }

    let device = state.store.create_device(new).await?;
    info!("registered device {} ({})", device.id, device.mac_address);

    Ok((StatusCode::CREATED, Json(device)))
}

/// GET /api/v1/devices
///
/// List devices with their workloads, paginated by `skip` and `limit`
pub async fn list_devices(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<DevicesResponse>> {
    let devices = state.store.list_devices(query.skip(), query.limit()).await?;

    Ok(Json(DevicesResponse {
        count: devices.len(),
        devices,
    }))
}

/// GET /api/v1/devices/:id
pub async fn get_device(
    State(state): State<ApiState>,
    Path(device_id): Path<DeviceId>,
) -> ApiResult<Json<Device>> {
    state
        .store
        .get_device(device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("device {device_id} not found")))
}

/// POST /api/v1/devices/:id/workloads
///
/// Register a workload on an existing device
pub async fn create_workload(
    State(state): State<ApiState>,
    Path(device_id): Path<DeviceId>,
    Json(new): Json<NewWorkload>,
) -> ApiResult<(StatusCode, Json<Workload>)> {
    let workload = state.store.create_workload(device_id, new).await?;
    info!(
        "registered {} workload '{}' on device {device_id}",
        workload.workload_type, workload.name
    );

    Ok((StatusCode::CREATED, Json(workload)))
}
