//! Error types for the screening engine

use crate::types::{ListSource, SubjectId};
use thiserror::Error;

/// Screening errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScreeningError {
    /// Required identity fields are missing or malformed. Caller must fix input.
    #[error("Invalid screening subject: {0}")]
    InvalidSubject(String),

    /// Transient repository I/O failure
    #[error("Watchlist repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// A repository call exceeded its per-call timeout
    #[error("Repository call {operation} timed out after {timeout_ms}ms")]
    RepositoryTimeout {
        /// Repository operation that timed out
        operation: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// A specific watchlist source is down
    #[error("Sanctions list unavailable: {0}")]
    ListUnavailable(ListSource),

    /// Another executor owns this schedule
    #[error("Schedule conflict for subject {0}")]
    ScheduleConflict(SubjectId),

    /// No schedule exists for the subject
    #[error("No screening schedule for subject {0}")]
    ScheduleNotFound(SubjectId),

    /// Subject directory has no record for the subject
    #[error("Subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker failure or broken invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScreeningError {
    /// Whether the scheduler may retry the unit with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScreeningError::RepositoryUnavailable(_)
                | ScreeningError::RepositoryTimeout { .. }
                | ScreeningError::ListUnavailable(_)
        )
    }

    /// Short label used for metrics and events
    pub fn kind(&self) -> &'static str {
        match self {
            ScreeningError::InvalidSubject(_) => "invalid_subject",
            ScreeningError::RepositoryUnavailable(_) => "repository_unavailable",
            ScreeningError::RepositoryTimeout { .. } => "repository_timeout",
            ScreeningError::ListUnavailable(_) => "list_unavailable",
            ScreeningError::ScheduleConflict(_) => "schedule_conflict",
            ScreeningError::ScheduleNotFound(_) => "schedule_not_found",
            ScreeningError::SubjectNotFound(_) => "subject_not_found",
            ScreeningError::Config(_) => "config",
            ScreeningError::Internal(_) => "internal",
        }
    }
}

/// Result type for screening operations
pub type Result<T> = std::result::Result<T, ScreeningError>;
