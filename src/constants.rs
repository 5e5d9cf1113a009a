//! # System Constants
//!
//! Defaults that define the operational boundaries of the task engine. Values that
//! operators are expected to tune live in [`crate::config`]; these are the fallbacks
//! used when a producer or configuration file leaves them out.

pub use crate::state_machine::TaskStatus;

/// Producer-facing defaults for newly enqueued tasks
pub mod defaults {
    /// Middle of the conventional 1..=10 priority range (lower runs first)
    pub const TASK_PRIORITY: i32 = 5;
    pub const TASK_MAX_ATTEMPTS: i32 = 3;
}

/// Engine-wide limits and timings
pub mod system {
    pub const DEFAULT_BATCH_SIZE: u32 = 10;
    pub const MAX_BATCH_SIZE: u32 = 100;
    pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 300;
    pub const DEFAULT_RUN_BUDGET_SECONDS: u64 = 240;
    pub const DEFAULT_HANDLER_TIMEOUT_SECONDS: u64 = 120;
    pub const DEFAULT_STALE_PROCESSING_TIMEOUT_SECONDS: u64 = 900;
    pub const TASKS_TABLE: &str = "tasker_queue_tasks";
}

/// Messages recorded on tasks by the engine itself (never produced by handlers)
pub mod messages {
    pub const UNKNOWN_TASK_TYPE: &str = "unknown task type";
    pub const STALE_RECLAIMED: &str = "reclaimed after stale processing";
    pub const RUN_BUDGET_EXCEEDED: &str = "run budget exceeded before execution";
    pub const STORE_UNAVAILABLE: &str = "not started: task store unavailable";
}
