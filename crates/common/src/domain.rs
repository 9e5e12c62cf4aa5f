mod device;
mod in_memory_store;
mod payload;
mod result;

pub use device::*;
pub use in_memory_store::*;
pub use payload::*;
pub use result::*;
pub use uplink_payload::UplinkStatus;
