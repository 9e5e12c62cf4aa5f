use common::domain::{
    default_device_name, Device, DeviceRepository, DeviceSummary, DomainError, DomainResult,
    GetDeviceRepoInput, GetOrCreateDeviceRepoInput,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Service request for resolving a device by devEUI, registering it if unseen
#[derive(Debug, Clone, Validate)]
pub struct GetOrCreateDeviceRequest {
    #[garde(length(chars, min = 1, max = 100))]
    pub dev_eui: String,
}

/// Service request for fetching one device
#[derive(Debug, Clone, Validate)]
pub struct GetDeviceRequest {
    #[garde(length(min = 1))]
    pub dev_eui: String,
}

/// Device registry and device read side
pub struct DeviceService {
    device_repository: Arc<dyn DeviceRepository>,
}

impl DeviceService {
    pub fn new(device_repository: Arc<dyn DeviceRepository>) -> Self {
        Self { device_repository }
    }

    /// Return the device for a devEUI, creating it with the default name and
    /// a `failing` status when absent. The flag is true for a new device.
    #[instrument(skip(self, request), fields(dev_eui = %request.dev_eui))]
    pub async fn get_or_create_device(
        &self,
        request: GetOrCreateDeviceRequest,
    ) -> DomainResult<(Device, bool)> {
        common::garde::validate_struct(&request)?;

        let default_name = default_device_name(&request.dev_eui);
        let (device, created) = self
            .device_repository
            .get_or_create_device(GetOrCreateDeviceRepoInput {
                dev_eui: request.dev_eui,
                default_name,
            })
            .await?;

        if created {
            info!(device_id = device.id, "registered new device");
        }

        Ok((device, created))
    }

    #[instrument(skip(self, request), fields(dev_eui = %request.dev_eui))]
    pub async fn get_device(&self, request: GetDeviceRequest) -> DomainResult<DeviceSummary> {
        common::garde::validate_struct(&request)?;

        self.device_repository
            .get_device_summary(GetDeviceRepoInput {
                dev_eui: request.dev_eui.clone(),
            })
            .await?
            .ok_or(DomainError::DeviceNotFound(request.dev_eui))
    }

    /// All devices, most recently updated first
    #[instrument(skip(self))]
    pub async fn list_devices(&self) -> DomainResult<Vec<DeviceSummary>> {
        let devices = self.device_repository.list_device_summaries().await?;
        debug!(count = devices.len(), "listed devices");
        Ok(devices)
    }
}
