use std::fmt;
use thiserror::Error;
use uplink_payload::PayloadError;

pub type DomainResult<T> = Result<T, DomainError>;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{}: {}", self.field, self.reason)
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {}", join_field_errors(.0))]
    ValidationError(Vec<FieldError>),

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Duplicate payload: fCnt {f_cnt} already exists for device {dev_eui}")]
    PayloadAlreadyExists { dev_eui: String, f_cnt: i64 },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// Shorthand for a validation failure on one field.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::ValidationError(vec![FieldError::new(field, reason)])
    }
}

impl From<PayloadError> for DomainError {
    fn from(error: PayloadError) -> Self {
        DomainError::InvalidEncoding(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_field() {
        let error = DomainError::ValidationError(vec![
            FieldError::new("dev_eui", "length is lower than 1"),
            FieldError::new("data", "invalid base64 data"),
        ]);
        assert_eq!(
            error.to_string(),
            "Validation error: dev_eui: length is lower than 1, data: invalid base64 data"
        );
    }

    #[test]
    fn test_duplicate_message_names_device_and_counter() {
        let error = DomainError::PayloadAlreadyExists {
            dev_eui: "AA:BB".to_string(),
            f_cnt: 7,
        };
        assert_eq!(
            error.to_string(),
            "Duplicate payload: fCnt 7 already exists for device AA:BB"
        );
    }
}
