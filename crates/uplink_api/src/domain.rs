mod device_service;
mod payload_ingestion_service;
mod payload_service;

pub use device_service::*;
pub use payload_ingestion_service::*;
pub use payload_service::*;
