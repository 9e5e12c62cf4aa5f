use crate::domain::{
    gateway_info_from_snapshot, Device, DeviceRepository, DeviceSummary, DomainError,
    DomainResult, GetDeviceRepoInput, GetOrCreateDeviceRepoInput, LatestPayload, UplinkStatus,
};
use crate::postgres::{parse_status, PostgresClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use tracing::{debug, instrument, warn};

const DEVICE_COLUMNS: &str =
    "id, dev_eui, name, description, latest_status, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT d.id, d.dev_eui, d.name, d.description, d.latest_status, d.created_at, d.updated_at,
        c.payloads_count,
        lp.id, lp.f_cnt, lp.status, lp.data_hex, lp.created_at, lp.raw_payload
 FROM devices d
 CROSS JOIN LATERAL (
     SELECT COUNT(*) AS payloads_count FROM payloads p WHERE p.device_id = d.id
 ) c
 LEFT JOIN LATERAL (
     SELECT p.id, p.f_cnt, p.status, p.data_hex, p.created_at, p.raw_payload
     FROM payloads p
     WHERE p.device_id = d.id
     ORDER BY p.created_at DESC, p.id DESC
     LIMIT 1
 ) lp ON TRUE";

/// Attempts at the insert-then-lookup cycle before giving up
const GET_OR_CREATE_ATTEMPTS: usize = 3;

/// Device row for PostgreSQL storage with timestamp metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: i64,
    pub dev_eui: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latest_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRow {
    fn from_row(row: &Row) -> Self {
        DeviceRow {
            id: row.get(0),
            dev_eui: row.get(1),
            name: row.get(2),
            description: row.get(3),
            latest_status: row.get(4),
            created_at: row.get(5),
            updated_at: row.get(6),
        }
    }
}

/// Convert database DeviceRow to domain Device
impl TryFrom<DeviceRow> for Device {
    type Error = DomainError;

    fn try_from(row: DeviceRow) -> DomainResult<Self> {
        Ok(Device {
            id: row.id,
            dev_eui: row.dev_eui,
            name: row.name,
            description: row.description,
            latest_status: parse_status(&row.latest_status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn summary_from_row(row: &Row) -> DomainResult<DeviceSummary> {
    let device = Device::try_from(DeviceRow::from_row(row))?;
    let payloads_count: i64 = row.get(7);

    let latest_id: Option<i64> = row.get(8);
    let (latest_payload, latest_gateway_info) = match latest_id {
        Some(id) => {
            let status: String = row.get(10);
            let raw_payload: serde_json::Value = row.get(13);
            let latest = LatestPayload {
                id,
                f_cnt: row.get(9),
                status: parse_status(&status)?,
                data_hex: row.get(11),
                created_at: row.get(12),
            };
            (Some(latest), gateway_info_from_snapshot(&raw_payload))
        }
        None => (None, None),
    };

    Ok(DeviceSummary {
        device,
        payloads_count,
        latest_payload,
        latest_gateway_info,
    })
}

/// PostgreSQL implementation of DeviceRepository trait
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui))]
    async fn get_device(&self, input: GetDeviceRepoInput) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!("SELECT {} FROM devices WHERE dev_eui = $1", DEVICE_COLUMNS),
                &[&input.dev_eui],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(|row| Device::try_from(DeviceRow::from_row(&row)))
            .transpose()
    }

    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui))]
    async fn get_or_create_device(
        &self,
        input: GetOrCreateDeviceRepoInput,
    ) -> DomainResult<(Device, bool)> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let insert_sql = format!(
            "INSERT INTO devices (dev_eui, name, latest_status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (dev_eui) DO NOTHING
             RETURNING {}",
            DEVICE_COLUMNS
        );
        let select_sql = format!("SELECT {} FROM devices WHERE dev_eui = $1", DEVICE_COLUMNS);
        let initial_status = UplinkStatus::default().as_str();

        for attempt in 1..=GET_OR_CREATE_ATTEMPTS {
            let now = Utc::now();
            let inserted = conn
                .query_opt(
                    &insert_sql,
                    &[&input.dev_eui, &input.default_name, &initial_status, &now],
                )
                .await
                .or_else(|e| match e.as_db_error() {
                    // 23505 is unique_violation, fall through to the lookup
                    Some(db_err) if db_err.code().code() == "23505" => Ok(None),
                    _ => Err(DomainError::RepositoryError(e.into())),
                })?;

            if let Some(row) = inserted {
                debug!("registered device: {}", input.dev_eui);
                return Ok((Device::try_from(DeviceRow::from_row(&row))?, true));
            }

            // Lost the insert race or the device already existed
            let existing = conn
                .query_opt(&select_sql, &[&input.dev_eui])
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;

            if let Some(row) = existing {
                return Ok((Device::try_from(DeviceRow::from_row(&row))?, false));
            }

            warn!(attempt, "device deleted between insert and lookup, retrying");
        }

        Err(DomainError::RepositoryError(anyhow::anyhow!(
            "could not get or create device {} after {} attempts",
            input.dev_eui,
            GET_OR_CREATE_ATTEMPTS
        )))
    }

    #[instrument(skip(self))]
    async fn list_device_summaries(&self) -> DomainResult<Vec<DeviceSummary>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!("{} ORDER BY d.updated_at DESC, d.id DESC", SUMMARY_SELECT),
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let summaries = rows
            .iter()
            .map(summary_from_row)
            .collect::<DomainResult<Vec<_>>>()?;

        debug!("found {} devices", summaries.len());

        Ok(summaries)
    }

    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui))]
    async fn get_device_summary(
        &self,
        input: GetDeviceRepoInput,
    ) -> DomainResult<Option<DeviceSummary>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!("{} WHERE d.dev_eui = $1", SUMMARY_SELECT),
                &[&input.dev_eui],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(summary_from_row).transpose()
    }
}
