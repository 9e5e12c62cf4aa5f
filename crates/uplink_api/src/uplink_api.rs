use crate::http::{build_router, UplinkApiServices};
use common::http::{run_http_server, HttpServerConfig};
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The HTTP API as a runner process
pub struct UplinkApi {
    services: UplinkApiServices,
    config: HttpServerConfig,
}

impl UplinkApi {
    pub fn new(services: UplinkApiServices, config: HttpServerConfig) -> Self {
        debug!("Initializing Uplink API module");
        Self { services, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
    {
        move |ctx| {
            Box::pin(async move {
                run_http_server(self.config, build_router(self.services), ctx).await
            })
        }
    }
}
