use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};

/// Transition table for the task lifecycle
///
/// ```text
/// queued     --claim-->                      processing
/// queued     --cancel-->                     cancelled
/// processing --complete-->                   completed
/// processing --fail | reclaim_stale (left)--> queued
/// processing --fail | reclaim_stale (none)--> failed
/// ```
///
/// The requeue edge is the single allowed move backwards and is only taken while
/// attempts remain; callers are responsible for pushing `scheduled_for` forward.
pub struct TaskStateMachine;

impl TaskStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: TaskStatus,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskStatus> {
        let target = match (current_state, event) {
            (TaskStatus::Queued, TaskEvent::Claim) => TaskStatus::Processing,
            (TaskStatus::Queued, TaskEvent::Cancel) => TaskStatus::Cancelled,

            (TaskStatus::Processing, TaskEvent::Complete) => TaskStatus::Completed,
            (TaskStatus::Processing, TaskEvent::Fail { retryable: true }) => TaskStatus::Queued,
            (TaskStatus::Processing, TaskEvent::Fail { retryable: false }) => TaskStatus::Failed,
            (TaskStatus::Processing, TaskEvent::ReclaimStale { retryable: true }) => {
                TaskStatus::Queued
            }
            (TaskStatus::Processing, TaskEvent::ReclaimStale { retryable: false }) => {
                TaskStatus::Failed
            }

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: Some(from_state.to_string()),
                    to: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Guard for claims: a task that already used its attempts is never claimed again
    pub fn check_claim_allowed(attempts: i32, max_attempts: i32) -> StateMachineResult<()> {
        if attempts >= max_attempts {
            return Err(StateMachineError::AttemptsExhausted {
                attempts,
                max_attempts,
            });
        }
        Ok(())
    }
}
