use crate::domain::{DomainError, FieldError};
use garde::{Report, Validate};

/// Convert garde validation report to DomainError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(field_errors(&report)))
}

/// Flatten a garde Report into one FieldError per failed rule
fn field_errors(report: &Report) -> Vec<FieldError> {
    report
        .iter()
        .map(|(path, error)| FieldError::new(path.to_string(), error.message().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct TestRequest {
        #[garde(length(min = 1))]
        field: String,
        #[garde(length(max = 3))]
        other: String,
    }

    #[test]
    fn test_validate_success() {
        let request = TestRequest {
            field: "value".to_string(),
            other: "abc".to_string(),
        };
        assert!(validate_struct(&request).is_ok());
    }

    #[test]
    fn test_validate_failure() {
        let request = TestRequest {
            field: "".to_string(),
            other: "abc".to_string(),
        };
        let result = validate_struct(&request);
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_validate_reports_each_field() {
        let request = TestRequest {
            field: "".to_string(),
            other: "abcd".to_string(),
        };
        match validate_struct(&request) {
            Err(DomainError::ValidationError(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(errors.len(), 2);
                assert!(fields.contains(&"field"));
                assert!(fields.contains(&"other"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }
}
