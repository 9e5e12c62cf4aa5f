use axum::routing::{get, post};
use axum::{Json, Router};
use common::domain::{DeviceRepository, PayloadRepository};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::{DeviceService, PayloadIngestionService, PayloadService};
use crate::http::{create_payload, get_device, list_devices, list_payloads};

/// Services shared by every handler
#[derive(Clone)]
pub struct UplinkApiServices {
    pub device_service: Arc<DeviceService>,
    pub payload_ingestion_service: Arc<PayloadIngestionService>,
    pub payload_service: Arc<PayloadService>,
}

impl UplinkApiServices {
    /// Wire all services over one pair of repositories.
    pub fn from_repositories(
        device_repository: Arc<dyn DeviceRepository>,
        payload_repository: Arc<dyn PayloadRepository>,
    ) -> Self {
        let device_service = Arc::new(DeviceService::new(device_repository));
        Self {
            payload_ingestion_service: Arc::new(PayloadIngestionService::new(
                device_service.clone(),
                payload_repository.clone(),
            )),
            payload_service: Arc::new(PayloadService::new(payload_repository)),
            device_service,
        }
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// API routes. Every route also answers without its trailing slash.
pub fn build_router(services: UplinkApiServices) -> Router {
    Router::new()
        .route("/api/payloads/", post(create_payload))
        .route("/api/payloads", post(create_payload))
        .route("/api/payloads/list/", get(list_payloads))
        .route("/api/payloads/list", get(list_payloads))
        .route("/api/devices/", get(list_devices))
        .route("/api/devices", get(list_devices))
        .route("/api/devices/:dev_eui/", get(get_device))
        .route("/api/devices/:dev_eui", get(get_device))
        .route("/healthz", get(healthz))
        .with_state(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use common::domain::InMemoryUplinkStore;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let store = Arc::new(InMemoryUplinkStore::new());
        build_router(UplinkApiServices::from_repositories(store.clone(), store))
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_then_read_back() {
        let router = test_router();

        let (status, body) = send(
            &router,
            post_json(
                "/api/payloads/",
                json!({
                    "devEUI": "AA:BB",
                    "fCnt": 1,
                    "data": "AQ==",
                    "rxInfo": [{"gatewayID": "gw-1", "rssi": -57}]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["device_devEUI"], "AA:BB");
        assert_eq!(body["fCnt"], 1);
        assert_eq!(body["data_hex"], "01");
        assert_eq!(body["status"], "passing");
        assert_eq!(body["raw_payload"]["txInfo"], json!({}));
        assert!(body.get("devEUI").is_none());
        assert!(body.get("rxInfo").is_none());

        let (status, device) = send(&router, get("/api/devices/AA:BB/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(device["devEUI"], "AA:BB");
        assert_eq!(device["name"], "Device AA:BB");
        assert_eq!(device["latest_status"], "passing");
        assert_eq!(device["payloads_count"], 1);
        assert_eq!(device["latest_payload"]["fCnt"], 1);
        assert_eq!(device["latest_gateway_info"]["gatewayID"], "gw-1");
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let router = test_router();
        let body = json!({"devEUI": "AA:BB", "fCnt": 1, "data": "AQ=="});

        let (status, _) = send(&router, post_json("/api/payloads/", body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, error) = send(&router, post_json("/api/payloads", body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error, json!({"error": "Duplicate payload detected"}));
    }

    #[tokio::test]
    async fn test_validation_errors_use_wire_names() {
        let router = test_router();

        let (status, body) = send(
            &router,
            post_json("/api/payloads/", json!({"devEUI": "", "fCnt": "x", "data": "AQ=="})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert!(body["fields"]["fCnt"].is_array());

        let (status, body) = send(
            &router,
            post_json("/api/payloads/", json!({"devEUI": "", "fCnt": 1, "data": "%%%"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["devEUI"].is_array());
        assert!(body["fields"]["data"].is_array());

        let (_, devices) = send(&router, get("/api/devices/")).await;
        assert_eq!(devices, json!([]));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let router = test_router();
        let request = Request::post("/api/payloads/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["non_field_errors"].is_array());
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let (status, body) = send(&test_router(), get("/api/devices/00:00")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("00:00"));
    }

    #[tokio::test]
    async fn test_list_payloads_filter() {
        let router = test_router();
        for (dev_eui, f_cnt) in [("AA:BB", 1), ("CC:DD", 1), ("AA:BB", 2)] {
            let (status, _) = send(
                &router,
                post_json(
                    "/api/payloads/",
                    json!({"devEUI": dev_eui, "fCnt": f_cnt, "data": "AA=="}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, all) = send(&router, get("/api/payloads/list/")).await;
        assert_eq!(all.as_array().unwrap().len(), 3);
        assert_eq!(all[0]["device_devEUI"], "AA:BB");
        assert_eq!(all[0]["fCnt"], 2);

        let (_, filtered) = send(&router, get("/api/payloads/list?devEUI=CC:DD")).await;
        assert_eq!(filtered.as_array().unwrap().len(), 1);

        let (_, blank) = send(&router, get("/api/payloads/list/?devEUI=")).await;
        assert_eq!(blank.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = send(&test_router(), get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
}
