//! Job store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Job not found or not owned by caller: {0}")]
    NotFoundOrNotOwned(String),

    #[error("Conflicting concurrent change: {0}")]
    Conflict(String),

    #[error("Schedule evaluation failed: {0}")]
    Schedule(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl StoreError {
    /// Whether the error describes a missing record rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::NotFoundOrNotOwned(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = StoreError::NotFound("job-123".to_string());
        let display = err.to_string();
        assert!(display.contains("not found"));
        assert!(display.contains("job-123"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_not_owned_error() {
        let err = StoreError::NotFoundOrNotOwned("job-9".to_string());
        assert!(err.to_string().contains("not owned"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_storage_error_is_not_not_found() {
        let err = StoreError::Storage("disk full".to_string());
        assert!(err.to_string().contains("disk full"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_serde_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err = StoreError::from(parse);
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_all_error_variants() {
        let errors: Vec<StoreError> = vec![
            StoreError::NotFound("a".to_string()),
            StoreError::NotFoundOrNotOwned("b".to_string()),
            StoreError::Conflict("c".to_string()),
            StoreError::Schedule("d".to_string()),
            StoreError::Storage("e".to_string()),
            StoreError::Serialization("f".to_string()),
            StoreError::Connection("g".to_string()),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
