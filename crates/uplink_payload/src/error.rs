use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64 data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid hex data: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("decoded payload is {actual} bytes, at most {max} allowed")]
    PayloadTooLarge { max: usize, actual: usize },

    #[error("unknown status: {0}")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, PayloadError>;
