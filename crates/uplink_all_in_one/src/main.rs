mod config;

use common::domain::{DeviceRepository, InMemoryUplinkStore, PayloadRepository};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresDeviceRepository, PostgresPayloadRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use crate::config::{ServiceConfig, StorageBackend};
use goose::MigrationRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uplink_api::{UplinkApi, UplinkApiServices};
use uplink_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        storage_backend = ?config.storage_backend,
        "Starting uplink-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let repositories = match initialize_storage(&config).await {
        Ok(repositories) => repositories,
        Err(e) => {
            error!("Failed to initialize storage: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let services =
        UplinkApiServices::from_repositories(repositories.device, repositories.payload);
    let uplink_api = UplinkApi::new(services, config.http_server_config());

    Runner::new()
        .with_named_process("uplink_api", uplink_api.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.closer_timeout_secs))
        .run()
        .await;
}

struct Repositories {
    device: Arc<dyn DeviceRepository>,
    payload: Arc<dyn PayloadRepository>,
}

async fn initialize_storage(config: &ServiceConfig) -> anyhow::Result<Repositories> {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data will not survive a restart");
            let store = Arc::new(InMemoryUplinkStore::new());
            Ok(Repositories {
                device: store.clone(),
                payload: store,
            })
        }
        StorageBackend::Postgres => {
            info!("Initializing PostgreSQL...");
            let postgres_config = config.postgres_config();
            run_postgres_migrations(&postgres_config).await?;

            let client = PostgresClient::from_config(&postgres_config)?;
            client.ping().await?;

            Ok(Repositories {
                device: Arc::new(PostgresDeviceRepository::new(client.clone())),
                payload: Arc::new(PostgresPayloadRepository::new(client)),
            })
        }
    }
}

async fn run_postgres_migrations(config: &PostgresConfig) -> anyhow::Result<()> {
    MigrationRunner::new(
        config.goose_binary_path.clone(),
        config.migrations_dir.clone(),
        "postgres".to_string(),
        config.dsn(),
    )
    .run_migrations()
    .await
}
