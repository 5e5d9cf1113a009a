//! Batch run reporting types.

use crate::models::Task;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-task line of a batch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRunResult {
    pub id: Uuid,
    pub task_name: String,
    pub task_type: String,
    pub success: bool,
    pub message: String,
}

impl TaskRunResult {
    pub fn new(task: &Task, success: bool, message: impl Into<String>) -> Self {
        Self {
            id: task.id,
            task_name: task.task_name.clone(),
            task_type: task.task_type.clone(),
            success,
            message: message.into(),
        }
    }
}

/// Outcome of one `run_batch` invocation
///
/// `processed` counts every task claimed by this invocation, including tasks that were
/// claimed but not started because the run budget ran out. Requeued tasks count as
/// failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<TaskRunResult>,
    /// The run budget was exhausted before every claimed task started
    pub timed_out: bool,
    /// Stale `processing` tasks recovered before claiming
    pub reclaimed: u64,
    /// Store failure that stopped the run after claiming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_error: Option<String>,
}

impl BatchSummary {
    pub fn record(&mut self, result: TaskRunResult) {
        self.processed += 1;
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Report claimed tasks that were never started, leaving them for stale reclaim
    pub fn record_not_started(&mut self, tasks: &[Task], message: &str) {
        for task in tasks {
            self.record(TaskRunResult::new(task, false, message));
        }
    }

    /// Counters agree with the per-task results
    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed == self.processed
            && self.results.len() == self.processed
            && self.results.iter().filter(|r| r.success).count() == self.succeeded
    }
}
