mod device_handler;
mod payload_handler;
mod router;
mod types;

pub use device_handler::*;
pub use payload_handler::*;
pub use router::*;
pub use types::*;
