pub mod classifier;
pub mod codec;
mod error;
mod status;

pub use classifier::classify;
pub use codec::{decode, decode_bounded, hex_to_bytes, DecodedPayload, MAX_DECODED_LEN};
pub use error::{PayloadError, Result};
pub use status::UplinkStatus;
