//! # In-Memory Task Store
//!
//! Process-local [`TaskStore`] that keeps every record behind one lock. Claim
//! selection and marking happen under the same lock acquisition, which gives the
//! same exclusivity the PostgreSQL store gets from `FOR UPDATE SKIP LOCKED`.
//!
//! [`InMemoryTaskStore::set_available`] simulates an unreachable backend so callers
//! can exercise infrastructure-error paths.

use super::{StaleReclaim, TaskActivityCount, TaskPurgeFilter, TaskStore};
use crate::error::{Result, TaskerError};
use crate::models::{NewTask, Task, TaskResolution};
use crate::state_machine::{TaskEvent, TaskStateMachine, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
    available: AtomicBool,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated reachability; while unavailable every operation fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert a fully-formed record as-is (fixtures, imports)
    pub fn insert_raw(&self, task: Task) {
        self.tasks.lock().insert(task.id, task);
    }

    /// Snapshot of every record, in claim order
    pub fn snapshot(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.lock().values().cloned().collect();
        tasks.sort_by_key(Task::claim_order);
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TaskerError::DatabaseError(
                "in-memory task store is unavailable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn enqueue(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task> {
        self.ensure_available()?;
        let task = new_task.into_task(now)?;
        self.tasks.lock().insert(task.id, task.clone());
        debug!(task_id = %task.id, task_type = %task.task_type, "Task enqueued");
        Ok(task)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Task>> {
        self.ensure_available()?;
        Ok(self.tasks.lock().get(&id).cloned())
    }

    async fn claim_batch(&self, limit: u32, now: DateTime<Utc>) -> Result<Vec<Task>> {
        self.ensure_available()?;
        let mut tasks = self.tasks.lock();

        let mut due: Vec<&Task> = tasks.values().filter(|task| task.is_due(now)).collect();
        due.sort_by_key(|task| task.claim_order());
        let selected: Vec<Uuid> = due
            .into_iter()
            .take(limit as usize)
            .map(|task| task.id)
            .collect();

        let mut claimed = Vec::with_capacity(selected.len());
        for id in selected {
            let Some(task) = tasks.get_mut(&id) else {
                continue;
            };
            TaskStateMachine::check_claim_allowed(task.attempts, task.max_attempts)?;
            task.status = TaskStateMachine::determine_target_state(task.status, &TaskEvent::Claim)?;
            task.attempts += 1;
            task.started_at = Some(now);
            task.completed_at = None;
            task.updated_at = now;
            claimed.push(task.clone());
        }

        Ok(claimed)
    }

    async fn resolve(&self, task: &Task, resolution: &TaskResolution) -> Result<bool> {
        self.ensure_available()?;
        let mut tasks = self.tasks.lock();

        let Some(stored) = tasks.get_mut(&task.id) else {
            warn!(task_id = %task.id, "Resolution skipped: task no longer exists");
            return Ok(false);
        };
        if stored.status != TaskStatus::Processing || stored.attempts != task.attempts {
            warn!(
                task_id = %task.id,
                stored_status = %stored.status,
                stored_attempts = stored.attempts,
                claimed_attempts = task.attempts,
                "Resolution skipped: claim no longer current"
            );
            return Ok(false);
        }

        resolution.apply_to(stored);
        Ok(true)
    }

    async fn reclaim_stale(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
        message: &str,
    ) -> Result<StaleReclaim> {
        self.ensure_available()?;
        let mut tasks = self.tasks.lock();
        let mut outcome = StaleReclaim::default();

        let stale = tasks.values_mut().filter(|task| {
            task.status == TaskStatus::Processing
                && task.started_at.is_some_and(|started| started < started_before)
        });

        for task in stale {
            let event = TaskEvent::stale(task.attempts, task.max_attempts);
            task.status = TaskStateMachine::determine_target_state(task.status, &event)?;
            task.error_message = Some(message.to_string());
            task.updated_at = now;
            if task.status == TaskStatus::Queued {
                task.scheduled_for = now;
                outcome.requeued += 1;
            } else {
                task.completed_at = Some(now);
                outcome.failed += 1;
            }
        }

        Ok(outcome)
    }

    async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_available()?;
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.get_mut(&id) else {
            return Ok(false);
        };
        match TaskStateMachine::determine_target_state(task.status, &TaskEvent::Cancel) {
            Ok(status) => {
                task.status = status;
                task.completed_at = Some(now);
                task.updated_at = now;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn delete_matching(&self, filter: &TaskPurgeFilter) -> Result<u64> {
        self.ensure_available()?;
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|_, task| {
            let matches = filter.statuses.contains(&task.status)
                && task
                    .completed_at
                    .is_some_and(|completed| completed < filter.completed_before);
            !matches
        });
        Ok((before - tasks.len()) as u64)
    }

    async fn activity_since(&self, since: DateTime<Utc>) -> Result<Vec<TaskActivityCount>> {
        self.ensure_available()?;
        let tasks = self.tasks.lock();
        let mut counts: BTreeMap<(String, &'static str), (TaskStatus, i64)> = BTreeMap::new();
        for task in tasks.values().filter(|task| task.created_at >= since) {
            counts
                .entry((task.task_type.clone(), task.status.as_str()))
                .or_insert((task.status, 0))
                .1 += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((task_type, _), (status, count))| TaskActivityCount {
                task_type,
                status,
                count,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_available()
    }
}
