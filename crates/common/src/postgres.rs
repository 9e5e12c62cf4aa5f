mod client;
mod config;
mod device_repository;
mod payload_repository;

pub use client::*;
pub use config::*;
pub use device_repository::*;
pub use payload_repository::*;

use crate::domain::{DomainError, DomainResult, UplinkStatus};

/// Status columns are TEXT guarded by a CHECK constraint
fn parse_status(value: &str) -> DomainResult<UplinkStatus> {
    value
        .parse::<UplinkStatus>()
        .map_err(|e| DomainError::RepositoryError(e.into()))
}
