//! # Orchestration Engine
//!
//! The batch engine: claim due tasks, dispatch them to their handlers, apply retry
//! policy to the outcomes and summarize the run.
//!
//! ## Core Components
//!
//! - **TaskClaimer**: atomic claim of due tasks plus stale-processing recovery
//! - **Dispatcher**: task type to handler routing, with error, panic and timeout capture
//! - **RetryManager**: outcome to final state, persisted with a conditional update
//! - **BackoffCalculator**: named retry-delay policies per task type
//! - **BatchRunner**: one cron-triggered run under a wall-clock budget
//! - **Clock**: injected time source shared by all of the above

pub mod backoff_calculator;
pub mod batch_runner;
pub mod clock;
pub mod dispatcher;
pub mod retry_manager;
pub mod task_claimer;
pub mod types;

pub use backoff_calculator::{BackoffCalculator, RetryPolicy};
pub use batch_runner::BatchRunner;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::Dispatcher;
pub use retry_manager::RetryManager;
pub use task_claimer::TaskClaimer;
pub use types::{BatchSummary, TaskRunResult};
