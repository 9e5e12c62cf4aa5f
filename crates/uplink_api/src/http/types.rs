use crate::domain::IngestPayloadRequest;
use chrono::{DateTime, Utc};
use common::domain::{
    DeviceSummary, DomainError, DomainResult, FieldError, LatestPayload, Payload, UplinkStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const INVALID_INTEGER: &str = "A valid integer is required.";
const INVALID_STRING: &str = "Not a valid string.";

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Strings are trimmed; numbers are accepted in their textual form.
fn parse_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(INVALID_STRING.to_string()),
    }
}

/// Integers, integral floats like `3.0` and numeric strings.
fn parse_integer(value: &Value) -> Result<i64, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(INVALID_INTEGER.to_string()),
    };

    let integral = match text.split_once('.') {
        Some((integral, fraction)) if fraction.chars().all(|c| c == '0') => integral,
        Some(_) => return Err(INVALID_INTEGER.to_string()),
        None => text.as_str(),
    };

    integral
        .parse::<i64>()
        .map_err(|_| INVALID_INTEGER.to_string())
}

fn parse_list(value: &Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(format!(
            "Expected a list of items but got type \"{}\".",
            json_type_name(other)
        )),
    }
}

fn parse_map(value: &Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        other => Err(format!(
            "Expected a dictionary of items but got type \"{}\".",
            json_type_name(other)
        )),
    }
}

/// Collects per-field shape errors so one response can report them all.
struct FieldReader<'a> {
    body: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl FieldReader<'_> {
    fn read<T>(
        &mut self,
        field: &str,
        required: bool,
        parse: fn(&Value) -> Result<T, String>,
    ) -> Option<T> {
        let reason = match self.body.get(field) {
            None if required => REQUIRED.to_string(),
            None => return None,
            Some(Value::Null) => NOT_NULL.to_string(),
            Some(value) => match parse(value) {
                Ok(parsed) => return Some(parsed),
                Err(reason) => reason,
            },
        };
        self.errors.push(FieldError::new(field, reason));
        None
    }
}

/// Turn an ingestion request body into a service request.
///
/// Checks only the JSON shape. Content rules (lengths, base64) are enforced
/// by the service.
pub fn ingest_request_from_json(body: Value) -> DomainResult<IngestPayloadRequest> {
    let Value::Object(body) = body else {
        return Err(DomainError::invalid_field(
            "",
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                json_type_name(&body)
            ),
        ));
    };

    let mut reader = FieldReader {
        body: &body,
        errors: Vec::new(),
    };

    let dev_eui = reader.read("devEUI", true, parse_string);
    let f_cnt = reader.read("fCnt", true, parse_integer);
    let data = reader.read("data", true, parse_string);
    let rx_info = reader.read("rxInfo", false, parse_list);
    let tx_info = reader.read("txInfo", false, parse_map);

    match (dev_eui, f_cnt, data) {
        (Some(dev_eui), Some(f_cnt), Some(data)) if reader.errors.is_empty() => {
            Ok(IngestPayloadRequest {
                dev_eui,
                f_cnt,
                data,
                rx_info: rx_info.unwrap_or_default(),
                tx_info: tx_info.unwrap_or_default(),
            })
        }
        _ => Err(DomainError::ValidationError(reader.errors)),
    }
}

/// Query string of the payload listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPayloadsQuery {
    #[serde(rename = "devEUI")]
    pub dev_eui: Option<String>,
}

/// Serialized payload. Request-only fields are never echoed.
#[derive(Debug, Clone, Serialize)]
pub struct PayloadResponse {
    pub id: i64,
    #[serde(rename = "device_devEUI")]
    pub device_dev_eui: String,
    #[serde(rename = "fCnt")]
    pub f_cnt: i64,
    pub data: String,
    pub data_hex: String,
    pub status: UplinkStatus,
    pub raw_payload: Value,
    pub created_at: DateTime<Utc>,
}

impl From<Payload> for PayloadResponse {
    fn from(payload: Payload) -> Self {
        Self {
            id: payload.id,
            device_dev_eui: payload.dev_eui,
            f_cnt: payload.f_cnt,
            data: payload.data,
            data_hex: payload.data_hex,
            status: payload.status,
            raw_payload: payload.raw_payload,
            created_at: payload.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LatestPayloadResponse {
    pub id: i64,
    #[serde(rename = "fCnt")]
    pub f_cnt: i64,
    pub status: UplinkStatus,
    pub data_hex: String,
    pub created_at: DateTime<Utc>,
}

impl From<LatestPayload> for LatestPayloadResponse {
    fn from(latest: LatestPayload) -> Self {
        Self {
            id: latest.id,
            f_cnt: latest.f_cnt,
            status: latest.status,
            data_hex: latest.data_hex,
            created_at: latest.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceResponse {
    pub id: i64,
    #[serde(rename = "devEUI")]
    pub dev_eui: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latest_status: UplinkStatus,
    pub payloads_count: i64,
    pub latest_payload: Option<LatestPayloadResponse>,
    pub latest_gateway_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeviceSummary> for DeviceResponse {
    fn from(summary: DeviceSummary) -> Self {
        let device = summary.device;
        Self {
            id: device.id,
            dev_eui: device.dev_eui,
            name: device.name,
            description: device.description,
            latest_status: device.latest_status,
            payloads_count: summary.payloads_count,
            latest_payload: summary.latest_payload.map(Into::into),
            latest_gateway_info: summary.latest_gateway_info,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_reasons(error: DomainError) -> Vec<(String, String)> {
        match error {
            DomainError::ValidationError(errors) => errors
                .into_iter()
                .map(|e| (e.field, e.reason))
                .collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_minimal_body() {
        let request =
            ingest_request_from_json(json!({"devEUI": "AA:BB", "fCnt": 1, "data": "AQ=="}))
                .unwrap();

        assert_eq!(request.dev_eui, "AA:BB");
        assert_eq!(request.f_cnt, 1);
        assert_eq!(request.data, "AQ==");
        assert!(request.rx_info.is_empty());
        assert!(request.tx_info.is_empty());
    }

    #[test]
    fn test_auxiliary_metadata_is_kept() {
        let request = ingest_request_from_json(json!({
            "devEUI": "AA:BB",
            "fCnt": 1,
            "data": "AQ==",
            "rxInfo": [{"gatewayID": "gw-1"}],
            "txInfo": {"frequency": 868100000},
            "unknown": true
        }))
        .unwrap();

        assert_eq!(request.rx_info, vec![json!({"gatewayID": "gw-1"})]);
        assert_eq!(request.tx_info["frequency"], json!(868100000));
    }

    #[test]
    fn test_frame_counter_forms() {
        for (value, expected) in [
            (json!(7), 7),
            (json!("7"), 7),
            (json!(" 12 "), 12),
            (json!(3.0), 3),
            (json!("4.00"), 4),
            (json!(-2), -2),
        ] {
            let request = ingest_request_from_json(
                json!({"devEUI": "AA:BB", "fCnt": value, "data": "AQ=="}),
            )
            .unwrap();
            assert_eq!(request.f_cnt, expected);
        }
    }

    #[test]
    fn test_frame_counter_rejects_non_integers() {
        for value in [json!(1.5), json!("abc"), json!(true), json!([1]), json!("1.2")] {
            let error = ingest_request_from_json(
                json!({"devEUI": "AA:BB", "fCnt": value, "data": "AQ=="}),
            )
            .unwrap_err();
            assert_eq!(
                field_reasons(error),
                vec![("fCnt".to_string(), INVALID_INTEGER.to_string())]
            );
        }
    }

    #[test]
    fn test_all_missing_fields_reported_together() {
        let error = ingest_request_from_json(json!({})).unwrap_err();
        let fields: Vec<_> = field_reasons(error).into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["devEUI", "fCnt", "data"]);
    }

    #[test]
    fn test_metadata_shape_errors() {
        let error = ingest_request_from_json(json!({
            "devEUI": "AA:BB",
            "fCnt": 1,
            "data": "AQ==",
            "rxInfo": {"gatewayID": "gw-1"},
            "txInfo": []
        }))
        .unwrap_err();

        assert_eq!(
            field_reasons(error),
            vec![
                (
                    "rxInfo".to_string(),
                    "Expected a list of items but got type \"dict\".".to_string()
                ),
                (
                    "txInfo".to_string(),
                    "Expected a dictionary of items but got type \"list\".".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_null_required_field() {
        let error =
            ingest_request_from_json(json!({"devEUI": null, "fCnt": 1, "data": "AQ=="}))
                .unwrap_err();
        assert_eq!(
            field_reasons(error),
            vec![("devEUI".to_string(), NOT_NULL.to_string())]
        );
    }

    #[test]
    fn test_non_object_body() {
        let error = ingest_request_from_json(json!([1, 2])).unwrap_err();
        let reasons = field_reasons(error);
        assert_eq!(reasons[0].0, "");
        assert!(reasons[0].1.contains("Expected a dictionary"));
    }

    #[test]
    fn test_payload_response_shape() {
        let created_at = Utc::now();
        let response = PayloadResponse::from(Payload {
            id: 3,
            device_id: 1,
            dev_eui: "AA:BB".to_string(),
            f_cnt: 1,
            data: "AQ==".to_string(),
            data_hex: "01".to_string(),
            status: UplinkStatus::Passing,
            raw_payload: json!({"devEUI": "AA:BB"}),
            created_at,
        });

        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["device_devEUI"], "AA:BB");
        assert_eq!(value["fCnt"], 1);
        assert_eq!(value["status"], "passing");
        assert!(value.get("devEUI").is_none());
        assert!(value.get("rxInfo").is_none());
        assert!(value.get("device_id").is_none());
    }
}
