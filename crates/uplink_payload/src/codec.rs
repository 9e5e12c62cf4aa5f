//! Base64 uplink decoding.
//!
//! Gateways forward the radio frame as standard-alphabet, padded base64.
//! Non-zero bits left over in the final symbol are ignored, so `AR==` decodes
//! like `AQ==`. The decoded bytes are kept alongside their canonical hex rendering: uppercase,
//! two digits per byte, no separators.

use crate::{PayloadError, Result};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

/// Largest decoded frame accepted. Its hex rendering fills the 500 character
/// `data_hex` column.
pub const MAX_DECODED_LEN: usize = 250;

const UPLINK_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

/// Result of decoding a base64 uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
    pub hex: String,
}

/// Decode a base64 string into raw bytes and their uppercase hex form.
pub fn decode(data_base64: &str) -> Result<DecodedPayload> {
    let bytes = UPLINK_ENGINE.decode(data_base64)?;
    let hex = hex::encode_upper(&bytes);
    Ok(DecodedPayload { bytes, hex })
}

/// Decode and enforce [`MAX_DECODED_LEN`].
pub fn decode_bounded(data_base64: &str) -> Result<DecodedPayload> {
    let decoded = decode(data_base64)?;
    if decoded.bytes.len() > MAX_DECODED_LEN {
        return Err(PayloadError::PayloadTooLarge {
            max: MAX_DECODED_LEN,
            actual: decoded.bytes.len(),
        });
    }
    Ok(decoded)
}

/// Inverse of the hex rendering produced by [`decode`].
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(hex)?)
}
