use thiserror::Error;

/// Error types for task state machine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from:?} on {to:?}")]
    InvalidTransition { from: Option<String>, to: String },

    #[error("Attempt limit reached: {attempts}/{max_attempts}")]
    AttemptsExhausted { attempts: i32, max_attempts: i32 },

    #[error("Invalid state in store: {0}")]
    InvalidState(String),
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
