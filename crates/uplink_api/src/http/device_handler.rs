use axum::extract::{Path, State};
use axum::Json;
use common::http::ApiError;
use tracing::instrument;

use crate::domain::GetDeviceRequest;
use crate::http::{DeviceResponse, UplinkApiServices};

/// `GET /api/devices/`
#[instrument(name = "ListDevices", skip(services))]
pub async fn list_devices(
    State(services): State<UplinkApiServices>,
) -> Result<Json<Vec<DeviceResponse>>, ApiError> {
    let devices = services.device_service.list_devices().await?;
    Ok(Json(devices.into_iter().map(Into::into).collect()))
}

/// `GET /api/devices/{devEUI}/`
#[instrument(name = "GetDevice", skip(services))]
pub async fn get_device(
    State(services): State<UplinkApiServices>,
    Path(dev_eui): Path<String>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = services
        .device_service
        .get_device(GetDeviceRequest { dev_eui })
        .await?;
    Ok(Json(device.into()))
}
