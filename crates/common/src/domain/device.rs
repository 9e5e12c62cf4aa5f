use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uplink_payload::UplinkStatus;

/// Domain representation of a physical device, keyed by its devEUI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: i64,
    pub dev_eui: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latest_status: UplinkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name given to a device registered implicitly by its first uplink
pub fn default_device_name(dev_eui: &str) -> String {
    format!("Device {}", dev_eui)
}

/// Condensed view of the most recently created payload of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestPayload {
    pub id: i64,
    pub f_cnt: i64,
    pub status: UplinkStatus,
    pub data_hex: String,
    pub created_at: DateTime<Utc>,
}

/// Device plus the aggregates shown by the listing endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub device: Device,
    pub payloads_count: i64,
    pub latest_payload: Option<LatestPayload>,
    /// First receiving gateway recorded in the latest payload's snapshot
    pub latest_gateway_info: Option<serde_json::Value>,
}

/// Input for looking up a device by devEUI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceRepoInput {
    pub dev_eui: String,
}

/// Input for the get-or-create upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrCreateDeviceRepoInput {
    pub dev_eui: String,
    pub default_name: String,
}

/// Repository trait for device persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Find a device by devEUI
    async fn get_device(&self, input: GetDeviceRepoInput) -> DomainResult<Option<Device>>;

    /// Return the device for a devEUI, creating it when absent.
    ///
    /// The boolean is true when this call created the row. A writer that
    /// loses a concurrent insert race gets the existing row, not an error.
    async fn get_or_create_device(
        &self,
        input: GetOrCreateDeviceRepoInput,
    ) -> DomainResult<(Device, bool)>;

    /// List all devices with aggregates, most recently updated first
    async fn list_device_summaries(&self) -> DomainResult<Vec<DeviceSummary>>;

    /// Get one device with aggregates
    async fn get_device_summary(
        &self,
        input: GetDeviceRepoInput,
    ) -> DomainResult<Option<DeviceSummary>>;
}
