//! # Retry Manager
//!
//! Turns a handler outcome into the final state of a claimed attempt and persists it.
//!
//! Whether a failure is retried depends only on the attempt count: failures with
//! attempts remaining go back to `queued` with `scheduled_for` pushed out by the task
//! type's [`RetryPolicy`](super::backoff_calculator::RetryPolicy); the last failure is
//! terminal. Data attached to a failure outcome is kept on the record as diagnostics.

use super::backoff_calculator::BackoffCalculator;
use crate::database::TaskStore;
use crate::error::Result;
use crate::models::{Task, TaskResolution};
use crate::registry::HandlerOutcome;
use crate::state_machine::{StateMachineResult, TaskEvent, TaskStateMachine, TaskStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    backoff: BackoffCalculator,
}

impl RetryManager {
    pub fn new(backoff: BackoffCalculator) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> &BackoffCalculator {
        &self.backoff
    }

    /// Compute the resolution of a claimed attempt without touching the store
    pub fn resolve(
        &self,
        task: &Task,
        outcome: &HandlerOutcome,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TaskResolution> {
        let event = if outcome.success {
            TaskEvent::Complete
        } else {
            TaskEvent::failure(task.attempts, task.max_attempts)
        };

        match TaskStateMachine::determine_target_state(task.status, &event)? {
            TaskStatus::Completed => Ok(TaskResolution::Completed {
                completed_at: now,
                result: outcome.data.clone(),
            }),
            TaskStatus::Queued => {
                let delay = self
                    .backoff
                    .delay_for(task.resolved_type().ok(), task.attempts);
                Ok(TaskResolution::Requeued {
                    completed_at: now,
                    scheduled_for: now + delay,
                    error_message: outcome.message.clone(),
                    result: outcome.data.clone(),
                })
            }
            _ => Ok(TaskResolution::Failed {
                completed_at: now,
                error_message: outcome.message.clone(),
                result: outcome.data.clone(),
            }),
        }
    }

    /// Resolve and persist; returns the resolution and whether the write applied
    ///
    /// A write that does not apply means the claim went stale while the handler ran
    /// (the row was reclaimed by another run). It is logged and left alone.
    pub async fn record(
        &self,
        store: &Arc<dyn TaskStore>,
        task: &Task,
        outcome: &HandlerOutcome,
        now: DateTime<Utc>,
    ) -> Result<(TaskResolution, bool)> {
        let resolution = self.resolve(task, outcome, now)?;
        let applied = store.resolve(task, &resolution).await?;

        if !applied {
            warn!(
                task_id = %task.id,
                attempts = task.attempts,
                "Task resolution not applied: claim is no longer current"
            );
        } else {
            match &resolution {
                TaskResolution::Requeued { scheduled_for, .. } => info!(
                    task_id = %task.id,
                    attempts = task.attempts,
                    max_attempts = task.max_attempts,
                    retry_at = %scheduled_for,
                    "Task failed, requeued for retry"
                ),
                TaskResolution::Failed { error_message, .. } => warn!(
                    task_id = %task.id,
                    attempts = task.attempts,
                    error = %error_message,
                    "Task failed permanently"
                ),
                TaskResolution::Completed { .. } => {
                    debug!(task_id = %task.id, attempts = task.attempts, "Task completed")
                }
            }
        }

        Ok((resolution, applied))
    }
}
