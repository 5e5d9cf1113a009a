//! # Task Model
//!
//! The unit of asynchronous work tracked by the engine.
//!
//! `parameters` and `result` are opaque JSON documents. The engine stores and returns
//! them untouched; only the handler selected by `task_type` gives them a typed shape.
//!
//! ## Database Schema
//!
//! Maps to the `tasker_queue_tasks` table (see `migrations/`):
//! - `id`: UUID primary key
//! - `task_type`: handler selector, stored as text so unknown values survive a round trip
//! - `status`: one of `queued`, `processing`, `completed`, `failed`, `cancelled`
//! - `attempts` / `max_attempts`: claim accounting
//! - `parameters` / `result`: JSONB payloads

use crate::constants::defaults;
use crate::error::{Result, TaskerError};
use crate::state_machine::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Closed set of task types the engine knows how to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ContentGeneration,
    KnowledgeCreation,
    Investigation,
    Notification,
    Maintenance,
    Analysis,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        Self::ContentGeneration,
        Self::KnowledgeCreation,
        Self::Investigation,
        Self::Notification,
        Self::Maintenance,
        Self::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentGeneration => "content_generation",
            Self::KnowledgeCreation => "knowledge_creation",
            Self::Investigation => "investigation",
            Self::Notification => "notification",
            Self::Maintenance => "maintenance",
            Self::Analysis => "analysis",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|task_type| task_type.as_str() == s)
            .ok_or_else(|| format!("unknown task type: {s}"))
    }
}

/// A persisted task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Raw type string as stored; see [`Task::resolved_type`]
    pub task_type: String,
    pub task_name: String,
    pub parameters: Value,
    pub priority: i32,
    pub scheduled_for: DateTime<Utc>,
    pub status: TaskStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Resolve the stored type string against the closed [`TaskType`] set
    pub fn resolved_type(&self) -> std::result::Result<TaskType, String> {
        self.task_type.parse()
    }

    /// Claimable right now: queued, due, and with attempts left
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable()
            && self.scheduled_for <= now
            && self.attempts < self.max_attempts
    }

    /// Ordering used by every claim: priority ascending, then schedule ascending
    pub fn claim_order(&self) -> (i32, DateTime<Utc>, Uuid) {
        (self.priority, self.scheduled_for, self.id)
    }
}

/// New task for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_type: String,
    pub task_name: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Defaults to "now" at insert time when absent
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

fn default_priority() -> i32 {
    defaults::TASK_PRIORITY
}

fn default_max_attempts() -> i32 {
    defaults::TASK_MAX_ATTEMPTS
}

impl NewTask {
    pub fn new(task_type: TaskType, task_name: impl Into<String>, parameters: Value) -> Self {
        Self::untyped(task_type.as_str(), task_name, parameters)
    }

    /// Build a task whose type string is not checked against [`TaskType`]
    ///
    /// Producers outside this crate write rows this way; an unresolvable type fails
    /// cleanly at dispatch time.
    pub fn untyped(
        task_type: impl Into<String>,
        task_name: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            task_name: task_name.into(),
            parameters,
            priority: defaults::TASK_PRIORITY,
            max_attempts: defaults::TASK_MAX_ATTEMPTS,
            scheduled_for: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.task_type.trim().is_empty() {
            return Err(TaskerError::ValidationError(
                "task_type must not be empty".to_string(),
            ));
        }
        if self.max_attempts < 1 {
            return Err(TaskerError::ValidationError(format!(
                "max_attempts must be at least 1, got {}",
                self.max_attempts
            )));
        }
        Ok(())
    }

    /// Materialize the queued record a store will persist
    pub fn into_task(self, now: DateTime<Utc>) -> Result<Task> {
        self.validate()?;
        Ok(Task {
            id: Uuid::new_v4(),
            task_type: self.task_type,
            task_name: self.task_name,
            parameters: self.parameters,
            priority: self.priority,
            scheduled_for: self.scheduled_for.unwrap_or(now),
            status: TaskStatus::Queued,
            attempts: 0,
            max_attempts: self.max_attempts,
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Final state computed for a claimed task after its handler ran
///
/// On the failure variants `result` carries the handler's diagnostic data (for
/// example per-recipient delivery errors) and replaces any earlier attempt's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum TaskResolution {
    Completed {
        completed_at: DateTime<Utc>,
        result: Option<Value>,
    },
    Requeued {
        completed_at: DateTime<Utc>,
        scheduled_for: DateTime<Utc>,
        error_message: String,
        #[serde(default)]
        result: Option<Value>,
    },
    Failed {
        completed_at: DateTime<Utc>,
        error_message: String,
        #[serde(default)]
        result: Option<Value>,
    },
}

impl TaskResolution {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Completed { .. } => TaskStatus::Completed,
            Self::Requeued { .. } => TaskStatus::Queued,
            Self::Failed { .. } => TaskStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Value written to the record's `result` column
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Completed { result, .. }
            | Self::Requeued { result, .. }
            | Self::Failed { result, .. } => result.as_ref(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Requeued { error_message, .. } | Self::Failed { error_message, .. } => {
                Some(error_message)
            }
        }
    }

    /// Apply the resolution to an in-memory record
    pub fn apply_to(&self, task: &mut Task) {
        task.status = self.status();
        match self {
            Self::Completed {
                completed_at,
                result,
            } => {
                task.completed_at = Some(*completed_at);
                task.result = result.clone();
                task.error_message = None;
                task.updated_at = *completed_at;
            }
            Self::Requeued {
                completed_at,
                scheduled_for,
                error_message,
                result,
            } => {
                task.completed_at = Some(*completed_at);
                task.scheduled_for = *scheduled_for;
                task.result = result.clone();
                task.error_message = Some(error_message.clone());
                task.updated_at = *completed_at;
            }
            Self::Failed {
                completed_at,
                error_message,
                result,
            } => {
                task.completed_at = Some(*completed_at);
                task.result = result.clone();
                task.error_message = Some(error_message.clone());
                task.updated_at = *completed_at;
            }
        }
    }
}
