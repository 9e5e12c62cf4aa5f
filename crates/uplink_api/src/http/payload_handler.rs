use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use common::http::ApiError;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::ListPayloadsRequest;
use crate::http::{ingest_request_from_json, ListPayloadsQuery, PayloadResponse, UplinkApiServices};

/// `POST /api/payloads/`
///
/// JSON body → service request → ingestion. Responds 201 with the stored payload.
#[instrument(name = "CreatePayload", skip(services, body))]
pub async fn create_payload(
    State(services): State<UplinkApiServices>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<PayloadResponse>), ApiError> {
    let Json(body) = body?;
    let request = ingest_request_from_json(body)?;

    let payload = services.payload_ingestion_service.ingest(request).await?;

    debug!(payload_id = payload.id, "Payload created successfully");

    Ok((StatusCode::CREATED, Json(payload.into())))
}

/// `GET /api/payloads/list/?devEUI=..`
#[instrument(name = "ListPayloads", skip(services, query), fields(dev_eui = ?query.dev_eui))]
pub async fn list_payloads(
    State(services): State<UplinkApiServices>,
    Query(query): Query<ListPayloadsQuery>,
) -> Result<Json<Vec<PayloadResponse>>, ApiError> {
    let payloads = services
        .payload_service
        .list_payloads(ListPayloadsRequest {
            dev_eui: query.dev_eui,
        })
        .await?;

    Ok(Json(payloads.into_iter().map(Into::into).collect()))
}
