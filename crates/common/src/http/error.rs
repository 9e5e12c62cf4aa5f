use crate::domain::{DomainError, FieldError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::error;

/// Domain field names that differ from the names clients send
const WIRE_FIELD_NAMES: &[(&str, &str)] = &[
    ("dev_eui", "devEUI"),
    ("f_cnt", "fCnt"),
    ("rx_info", "rxInfo"),
    ("tx_info", "txInfo"),
];

/// Field key for errors not tied to one input field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

fn wire_field_name(field: &str) -> &str {
    if field.is_empty() {
        return NON_FIELD_ERRORS;
    }
    WIRE_FIELD_NAMES
        .iter()
        .find(|(domain, _)| *domain == field)
        .map(|(_, wire)| *wire)
        .unwrap_or(field)
}

/// Group field errors as `{field: [reason, ..]}`
fn field_error_body(errors: &[FieldError]) -> Value {
    let mut fields = Map::new();
    for error in errors {
        let entry = fields
            .entry(wire_field_name(&error.field).to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(reasons) = entry {
            reasons.push(Value::String(error.reason.clone()));
        }
    }
    json!({ "error": "Validation failed", "fields": fields })
}

/// Convert domain error to an HTTP status and JSON body
pub fn domain_error_to_response(error: DomainError) -> (StatusCode, Value) {
    match error {
        DomainError::ValidationError(errors) => {
            (StatusCode::BAD_REQUEST, field_error_body(&errors))
        }

        DomainError::InvalidEncoding(reason) => (
            StatusCode::BAD_REQUEST,
            field_error_body(&[FieldError::new("data", reason)]),
        ),

        DomainError::PayloadAlreadyExists { .. } => (
            StatusCode::CONFLICT,
            json!({ "error": "Duplicate payload detected" }),
        ),

        DomainError::DeviceNotFound(dev_eui) => (
            StatusCode::NOT_FOUND,
            json!({ "error": format!("Device not found: {}", dev_eui) }),
        ),

        DomainError::RepositoryError(err) => {
            error!(error = %err, "repository error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal error" }),
            )
        }
    }
}

/// Error type returned by HTTP handlers
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApiError(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DomainError::invalid_field("", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = domain_error_to_response(self.0);
        (status, Json(body)).into_response()
    }
}
