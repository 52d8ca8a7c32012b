//! Engine errors.

use thiserror::Error;

use cronsentry_protocols::StoreError;

use crate::schedule::ScheduleError;

/// Monitor error types.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Request rejected before anything was persisted.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {0} belongs to another owner")]
    Forbidden(String),

    /// The record changed between read and write.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl MonitorError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::Store(_) | MonitorError::Conflict(_))
    }
}

impl From<StoreError> for MonitorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) | StoreError::NotFoundOrNotOwned(id) => {
                MonitorError::NotFound(id)
            }
            StoreError::Conflict(msg) => MonitorError::Conflict(msg),
            other => MonitorError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err = MonitorError::from(StoreError::NotFound("job-1".to_string()));
        assert!(matches!(err, MonitorError::NotFound(ref id) if id == "job-1"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_not_owned_maps_to_not_found() {
        let err = MonitorError::from(StoreError::NotFoundOrNotOwned("job-2".to_string()));
        assert!(matches!(err, MonitorError::NotFound(_)));
    }

    #[test]
    fn test_storage_failure_is_transient() {
        let err = MonitorError::from(StoreError::Storage("database is locked".to_string()));
        assert!(err.is_transient());
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_schedule_error_is_not_transient() {
        let err = MonitorError::from(ScheduleError::Empty);
        assert!(!err.is_transient());
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_forbidden_display() {
        let err = MonitorError::Forbidden("job-3".to_string());
        assert!(err.to_string().contains("another owner"));
    }
}
