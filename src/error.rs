//! Error types for the task engine.

use crate::state_machine::StateMachineError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl TaskerError {
    /// Infrastructure errors are never attributed to an individual task
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::DatabaseError(_) | Self::ConfigurationError(_))
    }
}

impl From<serde_json::Error> for TaskerError {
    fn from(error: serde_json::Error) -> Self {
        TaskerError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for TaskerError {
    fn from(err: sqlx::Error) -> Self {
        TaskerError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for TaskerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        TaskerError::DatabaseError(format!("Migration failed: {err}"))
    }
}

impl From<StateMachineError> for TaskerError {
    fn from(err: StateMachineError) -> Self {
        TaskerError::StateTransitionError(err.to_string())
    }
}

impl From<config::ConfigError> for TaskerError {
    fn from(err: config::ConfigError) -> Self {
        TaskerError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_category() {
        let err = TaskerError::DatabaseError("connection refused".to_string());
        assert_eq!(err.to_string(), "Database error: connection refused");
        assert!(err.is_infrastructure());
        assert!(!TaskerError::ValidationError("limit must be positive".to_string()).is_infrastructure());
    }

    #[test]
    fn test_state_machine_error_conversion() {
        let err: TaskerError = StateMachineError::InvalidTransition {
            from: Some("completed".to_string()),
            to: "claim".to_string(),
        }
        .into();
        assert!(matches!(err, TaskerError::StateTransitionError(_)));
    }
}
