use crate::domain::{
    gateway_info_from_snapshot, CommitPayloadRepoInput, Device, DeviceRepository, DeviceSummary,
    DomainError, DomainResult, GetDeviceRepoInput, GetOrCreateDeviceRepoInput, LatestPayload,
    ListPayloadsRepoInput, Payload, PayloadExistsRepoInput, PayloadRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uplink_payload::UplinkStatus;

#[derive(Default)]
struct StoreState {
    devices: HashMap<String, Device>,
    /// Insertion order doubles as creation order
    payloads: Vec<Payload>,
    next_device_id: i64,
    next_payload_id: i64,
}

impl StoreState {
    fn summarize(&self, device: &Device) -> DeviceSummary {
        let owned = self.payloads.iter().filter(|p| p.device_id == device.id);
        let payloads_count = owned.clone().count() as i64;
        let latest = owned.last();

        DeviceSummary {
            device: device.clone(),
            payloads_count,
            latest_payload: latest.map(|p| LatestPayload {
                id: p.id,
                f_cnt: p.f_cnt,
                status: p.status,
                data_hex: p.data_hex.clone(),
                created_at: p.created_at,
            }),
            latest_gateway_info: latest.and_then(|p| gateway_info_from_snapshot(&p.raw_payload)),
        }
    }
}

/// In-memory implementation of DeviceRepository and PayloadRepository.
///
/// A single lock guards devices and payloads, so each commit is atomic.
#[derive(Clone, Default)]
pub struct InMemoryUplinkStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryUplinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRepository for InMemoryUplinkStore {
    async fn get_device(&self, input: GetDeviceRepoInput) -> DomainResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state.devices.get(&input.dev_eui).cloned())
    }

    async fn get_or_create_device(
        &self,
        input: GetOrCreateDeviceRepoInput,
    ) -> DomainResult<(Device, bool)> {
        let mut state = self.state.write().await;
        if let Some(device) = state.devices.get(&input.dev_eui) {
            return Ok((device.clone(), false));
        }

        state.next_device_id += 1;
        let now = Utc::now();
        let device = Device {
            id: state.next_device_id,
            dev_eui: input.dev_eui.clone(),
            name: Some(input.default_name),
            description: None,
            latest_status: UplinkStatus::default(),
            created_at: now,
            updated_at: now,
        };
        state.devices.insert(input.dev_eui, device.clone());
        debug!(dev_eui = %device.dev_eui, "registered device");

        Ok((device, true))
    }

    async fn list_device_summaries(&self) -> DomainResult<Vec<DeviceSummary>> {
        let state = self.state.read().await;
        let mut devices: Vec<&Device> = state.devices.values().collect();
        devices.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(devices.into_iter().map(|d| state.summarize(d)).collect())
    }

    async fn get_device_summary(
        &self,
        input: GetDeviceRepoInput,
    ) -> DomainResult<Option<DeviceSummary>> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .get(&input.dev_eui)
            .map(|device| state.summarize(device)))
    }
}

#[async_trait]
impl PayloadRepository for InMemoryUplinkStore {
    async fn payload_exists(&self, input: PayloadExistsRepoInput) -> DomainResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .payloads
            .iter()
            .any(|p| p.dev_eui == input.dev_eui && p.f_cnt == input.f_cnt))
    }

    async fn commit_payload(&self, input: CommitPayloadRepoInput) -> DomainResult<Payload> {
        let mut state = self.state.write().await;

        if !state.devices.values().any(|d| d.id == input.device_id) {
            return Err(DomainError::DeviceNotFound(input.dev_eui));
        }
        if state
            .payloads
            .iter()
            .any(|p| p.device_id == input.device_id && p.f_cnt == input.f_cnt)
        {
            return Err(DomainError::PayloadAlreadyExists {
                dev_eui: input.dev_eui,
                f_cnt: input.f_cnt,
            });
        }

        state.next_payload_id += 1;
        let payload = Payload {
            id: state.next_payload_id,
            device_id: input.device_id,
            dev_eui: input.dev_eui,
            f_cnt: input.f_cnt,
            data: input.data,
            data_hex: input.data_hex,
            status: input.status,
            raw_payload: input.raw_payload,
            created_at: Utc::now(),
        };

        if let Some(device) = state
            .devices
            .values_mut()
            .find(|d| d.id == payload.device_id)
        {
            device.latest_status = payload.status;
            device.updated_at = payload.created_at;
        }
        state.payloads.push(payload.clone());

        Ok(payload)
    }

    async fn list_payloads(&self, input: ListPayloadsRepoInput) -> DomainResult<Vec<Payload>> {
        let state = self.state.read().await;
        Ok(state
            .payloads
            .iter()
            .rev()
            .filter(|p| {
                input
                    .dev_eui
                    .as_ref()
                    .map_or(true, |dev_eui| &p.dev_eui == dev_eui)
            })
            .cloned()
            .collect())
    }
}
