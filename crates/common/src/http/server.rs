//! Reusable axum server with request ids, tracing, access logging and
//! graceful shutdown.
//!
//! # Example
//!
//! ```ignore
//! use common::http::{run_http_server, HttpServerConfig};
//!
//! let router = Router::new().route("/healthz", get(|| async { "ok" }));
//! run_http_server(HttpServerConfig::default(), router, cancellation_token).await?;
//! ```

use std::net::SocketAddr;

use anyhow::Context as _;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{debug, error};

use super::{HttpLoggingConfig, HttpLoggingLayer, HttpTracingLayer};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    /// Access log configuration. Ignored paths are also left untraced.
    pub logging_config: HttpLoggingConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            logging_config: HttpLoggingConfig::default(),
        }
    }
}

impl HttpServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid server address {}:{}", self.host, self.port))
    }
}

/// Wrap a router with the standard middleware stack.
///
/// Outermost first: request id assignment, request id propagation to the
/// response, OpenTelemetry span, access log.
pub fn apply_http_layers(router: Router, logging_config: &HttpLoggingConfig) -> Router {
    router
        .layer(HttpLoggingLayer::new(logging_config.clone()))
        .layer(HttpTracingLayer::new(logging_config.ignored_paths.clone()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Bind the configured address and serve until the token is cancelled.
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve_http(listener, config, router, cancellation_token).await
}

/// Serve on an already bound listener.
pub async fn serve_http(
    listener: TcpListener,
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let app = apply_http_layers(router, &config.logging_config);

    debug!(address = ?listener.local_addr().ok(), "Starting HTTP server");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        debug!("HTTP server shutdown signal received");
    });

    match serve.await {
        Ok(()) => {
            debug!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("HTTP server error: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new().route("/healthz", get(|| async { "ok" }))
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        let bad = HttpServerConfig {
            host: "not an address".to_string(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[tokio::test]
    async fn test_layers_assign_request_id() {
        let app = apply_http_layers(test_router(), &HttpLoggingConfig::default());

        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_layers_keep_caller_request_id() {
        let app = apply_http_layers(test_router(), &HttpLoggingConfig::default());

        let response = app
            .oneshot(
                Request::get("/healthz")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_server_stops_on_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();

        let handle = tokio::spawn(serve_http(
            listener,
            HttpServerConfig::default(),
            test_router(),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
