use crate::postgres::PostgresConfig;
use anyhow::Result;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::debug;

/// Pooled PostgreSQL access shared by the repositories
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Build the pool. No connection is opened until first use; call
    /// [`PostgresClient::ping`] to fail fast at startup.
    pub fn from_config(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.max_pool_size));

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        debug!(
            host = %config.host,
            database = %config.database,
            max_pool_size = config.max_pool_size,
            "postgres pool created"
        );

        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }
}
