use crate::domain::{DeviceService, GetOrCreateDeviceRequest};
use common::domain::{
    CommitPayloadRepoInput, DomainError, DomainResult, Payload, PayloadExistsRepoInput,
    PayloadRepository, RawPayloadSnapshot,
};
use garde::Validate;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Rejects anything the codec would refuse, including oversized frames.
fn valid_base64(value: &str, _context: &()) -> garde::Result {
    uplink_payload::decode_bounded(value)
        .map(|_| ())
        .map_err(|e| garde::Error::new(e.to_string()))
}

/// Service request for ingesting one uplink
#[derive(Debug, Clone, Validate)]
pub struct IngestPayloadRequest {
    #[garde(length(chars, min = 1, max = 100))]
    pub dev_eui: String,
    #[garde(skip)]
    pub f_cnt: i64,
    #[garde(length(min = 1), custom(valid_base64))]
    pub data: String,
    /// Receive metadata, kept only in the audit snapshot
    #[garde(skip)]
    pub rx_info: Vec<Value>,
    /// Transmit metadata, kept only in the audit snapshot
    #[garde(skip)]
    pub tx_info: Map<String, Value>,
}

/// Ingestion pipeline for device uplinks
///
/// Flow:
/// 1. Validate the request
/// 2. Advisory duplicate check on (devEUI, fCnt)
/// 3. Resolve or register the device
/// 4. Decode and classify the payload
/// 5. Commit payload and device status atomically
///
/// The storage uniqueness constraint on (device, fCnt) is what actually
/// guarantees no duplicate; step 2 only rejects the common case early.
pub struct PayloadIngestionService {
    device_service: Arc<DeviceService>,
    payload_repository: Arc<dyn PayloadRepository>,
}

impl PayloadIngestionService {
    pub fn new(
        device_service: Arc<DeviceService>,
        payload_repository: Arc<dyn PayloadRepository>,
    ) -> Self {
        Self {
            device_service,
            payload_repository,
        }
    }

    #[instrument(skip(self, request), fields(dev_eui = %request.dev_eui, f_cnt = request.f_cnt))]
    pub async fn ingest(&self, request: IngestPayloadRequest) -> DomainResult<Payload> {
        common::garde::validate_struct(&request)?;

        let exists = self
            .payload_repository
            .payload_exists(PayloadExistsRepoInput {
                dev_eui: request.dev_eui.clone(),
                f_cnt: request.f_cnt,
            })
            .await?;

        if exists {
            warn!("duplicate payload rejected before commit");
            return Err(DomainError::PayloadAlreadyExists {
                dev_eui: request.dev_eui,
                f_cnt: request.f_cnt,
            });
        }

        let (device, _) = self
            .device_service
            .get_or_create_device(GetOrCreateDeviceRequest {
                dev_eui: request.dev_eui.clone(),
            })
            .await?;

        let decoded = uplink_payload::decode_bounded(&request.data)?;
        let status = uplink_payload::classify(&decoded.hex);

        debug!(data_hex = %decoded.hex, status = %status, "classified payload");

        let raw_payload = RawPayloadSnapshot {
            dev_eui: request.dev_eui.clone(),
            f_cnt: request.f_cnt,
            data: request.data.clone(),
            rx_info: request.rx_info,
            tx_info: request.tx_info,
        }
        .into_value()?;

        let payload = self
            .payload_repository
            .commit_payload(CommitPayloadRepoInput {
                device_id: device.id,
                dev_eui: request.dev_eui,
                f_cnt: request.f_cnt,
                data: request.data,
                data_hex: decoded.hex,
                status,
                raw_payload,
            })
            .await?;

        info!(payload_id = payload.id, status = %payload.status, "ingested payload");

        Ok(payload)
    }
}
