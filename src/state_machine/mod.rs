// State machine module for the task lifecycle
//
// All status changes made by the claimer, retry manager, stale reclaim and
// operator cancellation are computed here, so every store backend applies the
// same transition table.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::TaskStateMachine;
