use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uplink_payload::UplinkStatus;

/// An accepted uplink. Immutable once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub id: i64,
    pub device_id: i64,
    pub dev_eui: String,
    pub f_cnt: i64,
    /// Base64 exactly as received
    pub data: String,
    pub data_hex: String,
    pub status: UplinkStatus,
    pub raw_payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Audit copy of an inbound uplink request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPayloadSnapshot {
    #[serde(rename = "devEUI")]
    pub dev_eui: String,
    #[serde(rename = "fCnt")]
    pub f_cnt: i64,
    pub data: String,
    #[serde(rename = "rxInfo")]
    pub rx_info: Vec<Value>,
    #[serde(rename = "txInfo")]
    pub tx_info: Map<String, Value>,
}

impl RawPayloadSnapshot {
    pub fn into_value(self) -> DomainResult<Value> {
        serde_json::to_value(self).map_err(|e| DomainError::RepositoryError(e.into()))
    }
}

/// First `rxInfo` entry of a stored snapshot, if any
pub fn gateway_info_from_snapshot(raw_payload: &Value) -> Option<Value> {
    raw_payload
        .get("rxInfo")
        .and_then(Value::as_array)
        .and_then(|rx_info| rx_info.first())
        .cloned()
}

/// Input for the advisory duplicate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadExistsRepoInput {
    pub dev_eui: String,
    pub f_cnt: i64,
}

/// Input for atomically storing a payload and updating its device
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPayloadRepoInput {
    pub device_id: i64,
    pub dev_eui: String,
    pub f_cnt: i64,
    pub data: String,
    pub data_hex: String,
    pub status: UplinkStatus,
    pub raw_payload: Value,
}

/// Input for listing payloads, optionally for one device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPayloadsRepoInput {
    pub dev_eui: Option<String>,
}

/// Repository trait for payload persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PayloadRepository: Send + Sync {
    /// Whether a payload already exists for (devEUI, fCnt). Advisory only.
    async fn payload_exists(&self, input: PayloadExistsRepoInput) -> DomainResult<bool>;

    /// Insert the payload and set the device's latest status in one atomic unit.
    ///
    /// Fails with `PayloadAlreadyExists` when (device, fCnt) is taken, in which
    /// case the device row is left untouched.
    async fn commit_payload(&self, input: CommitPayloadRepoInput) -> DomainResult<Payload>;

    /// List payloads, most recently created first
    async fn list_payloads(&self, input: ListPayloadsRepoInput) -> DomainResult<Vec<Payload>>;
}
