use serde::{Deserialize, Serialize};

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    pub migrations_dir: String,
    pub goose_binary_path: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "uplink".to_string(),
            username: "uplink".to_string(),
            password: "uplink".to_string(),
            max_pool_size: 10,
            migrations_dir: "crates/common/migrations/postgres".to_string(),
            goose_binary_path: "goose".to_string(),
        }
    }
}

impl PostgresConfig {
    /// DSN in the form goose expects
    pub fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn() {
        let config = PostgresConfig {
            host: "db".to_string(),
            port: 6543,
            ..Default::default()
        };
        assert_eq!(
            config.dsn(),
            "postgres://uplink:uplink@db:6543/uplink?sslmode=disable"
        );
    }
}
