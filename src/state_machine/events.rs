use serde::{Deserialize, Serialize};

/// Events that can trigger task status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Selected by a batch run
    Claim,
    /// Handler reported success
    Complete,
    /// Handler reported (or raised) a failure
    Fail { retryable: bool },
    /// Task was left in processing past the staleness timeout
    ReclaimStale { retryable: bool },
    /// Operator withdrew the task
    Cancel,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Complete => "complete",
            Self::Fail { .. } => "fail",
            Self::ReclaimStale { .. } => "reclaim_stale",
            Self::Cancel => "cancel",
        }
    }

    /// Build the failure event for a task given its attempt accounting
    pub fn failure(attempts: i32, max_attempts: i32) -> Self {
        Self::Fail {
            retryable: attempts < max_attempts,
        }
    }

    /// Build the stale reclaim event for a task given its attempt accounting
    pub fn stale(attempts: i32, max_attempts: i32) -> Self {
        Self::ReclaimStale {
            retryable: attempts < max_attempts,
        }
    }
}
