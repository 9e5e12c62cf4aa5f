use crate::domain::{
    CommitPayloadRepoInput, DomainError, DomainResult, ListPayloadsRepoInput, Payload,
    PayloadExistsRepoInput, PayloadRepository, UplinkStatus,
};
use crate::postgres::{parse_status, PostgresClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Transaction;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use tracing::{debug, instrument, warn};

/// Payload row joined with its owning device's devEUI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadRow {
    pub id: i64,
    pub device_id: i64,
    pub dev_eui: String,
    pub f_cnt: i64,
    pub data: String,
    pub data_hex: String,
    pub status: String,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PayloadRow {
    fn from_row(row: &Row) -> Self {
        PayloadRow {
            id: row.get(0),
            device_id: row.get(1),
            dev_eui: row.get(2),
            f_cnt: row.get(3),
            data: row.get(4),
            data_hex: row.get(5),
            status: row.get(6),
            raw_payload: row.get(7),
            created_at: row.get(8),
        }
    }
}

impl TryFrom<PayloadRow> for Payload {
    type Error = DomainError;

    fn try_from(row: PayloadRow) -> DomainResult<Self> {
        Ok(Payload {
            id: row.id,
            device_id: row.device_id,
            dev_eui: row.dev_eui,
            f_cnt: row.f_cnt,
            data: row.data,
            data_hex: row.data_hex,
            status: parse_status(&row.status)?,
            raw_payload: row.raw_payload,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL implementation of PayloadRepository trait
#[derive(Clone)]
pub struct PostgresPayloadRepository {
    client: PostgresClient,
}

impl PostgresPayloadRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    /// Take the device row lock that serialises commits for one device.
    /// Returns None when the device no longer exists.
    async fn lock_device(tx: &Transaction<'_>, device_id: i64) -> DomainResult<Option<i64>> {
        let row = tx
            .query_opt("SELECT id FROM devices WHERE id = $1 FOR UPDATE", &[&device_id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;
        Ok(row.map(|row| row.get(0)))
    }

    /// Insert unless (device_id, f_cnt) is taken. `created_at` comes from the
    /// database clock, read after the device lock is held.
    async fn insert_payload_if_absent(
        tx: &Transaction<'_>,
        input: &CommitPayloadRepoInput,
    ) -> DomainResult<Option<(i64, DateTime<Utc>)>> {
        let result = tx
            .query_opt(
                "INSERT INTO payloads (device_id, f_cnt, data, data_hex, status, raw_payload, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, clock_timestamp())
                 ON CONFLICT (device_id, f_cnt) DO NOTHING
                 RETURNING id, created_at",
                &[
                    &input.device_id,
                    &input.f_cnt,
                    &input.data,
                    &input.data_hex,
                    &input.status.as_str(),
                    &input.raw_payload,
                ],
            )
            .await;

        match result {
            Ok(row) => Ok(row.map(|row| (row.get(0), row.get(1)))),
            Err(e) => {
                // 23505 is unique_violation; treat it like the ON CONFLICT path
                if let Some(db_err) = e.as_db_error() {
                    if db_err.code().code() == "23505" {
                        return Ok(None);
                    }
                }
                Err(DomainError::RepositoryError(e.into()))
            }
        }
    }

    async fn update_device_status(
        tx: &Transaction<'_>,
        device_id: i64,
        status: UplinkStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        tx.execute(
            "UPDATE devices SET latest_status = $1, updated_at = $2 WHERE id = $3",
            &[&status.as_str(), &updated_at, &device_id],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl PayloadRepository for PostgresPayloadRepository {
    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui, f_cnt = input.f_cnt))]
    async fn payload_exists(&self, input: PayloadExistsRepoInput) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT EXISTS (
                     SELECT 1 FROM payloads p
                     INNER JOIN devices d ON d.id = p.device_id
                     WHERE d.dev_eui = $1 AND p.f_cnt = $2
                 )",
                &[&input.dev_eui, &input.f_cnt],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }

    #[instrument(skip(self, input), fields(dev_eui = %input.dev_eui, f_cnt = input.f_cnt, status = %input.status))]
    async fn commit_payload(&self, input: CommitPayloadRepoInput) -> DomainResult<Payload> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if Self::lock_device(&tx, input.device_id).await?.is_none() {
            return Err(DomainError::DeviceNotFound(input.dev_eui));
        }

        let Some((id, created_at)) = Self::insert_payload_if_absent(&tx, &input).await? else {
            tx.rollback()
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            warn!("payload insert lost to an existing frame counter");
            return Err(DomainError::PayloadAlreadyExists {
                dev_eui: input.dev_eui,
                f_cnt: input.f_cnt,
            });
        };

        Self::update_device_status(&tx, input.device_id, input.status, created_at).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(payload_id = id, "committed payload");

        Ok(Payload {
            id,
            device_id: input.device_id,
            dev_eui: input.dev_eui,
            f_cnt: input.f_cnt,
            data: input.data,
            data_hex: input.data_hex,
            status: input.status,
            raw_payload: input.raw_payload,
            created_at,
        })
    }

    #[instrument(skip(self, input), fields(dev_eui = ?input.dev_eui))]
    async fn list_payloads(&self, input: ListPayloadsRepoInput) -> DomainResult<Vec<Payload>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT p.id, p.device_id, d.dev_eui, p.f_cnt, p.data, p.data_hex, p.status, p.raw_payload, p.created_at
                 FROM payloads p
                 INNER JOIN devices d ON d.id = p.device_id
                 WHERE $1::TEXT IS NULL OR d.dev_eui = $1
                 ORDER BY p.created_at DESC, p.id DESC",
                &[&input.dev_eui],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let payloads = rows
            .iter()
            .map(|row| Payload::try_from(PayloadRow::from_row(row)))
            .collect::<DomainResult<Vec<_>>>()?;

        debug!("found {} payloads", payloads.len());

        Ok(payloads)
    }
}
