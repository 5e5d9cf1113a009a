//! # Task Record Store
//!
//! Persistence boundary for task records. The engine needs three kinds of operation:
//! select-matching-and-claim, update-by-id, and delete-matching-predicate. Everything
//! else here (enqueue, find, cancel, activity counts) serves producers, operators and
//! the built-in handlers.
//!
//! Every mutation touches task rows independently: no operation needs a transaction
//! spanning more than one task.
//!
//! - [`PgTaskStore`]: PostgreSQL via SQLx, claims with `FOR UPDATE SKIP LOCKED`
//! - [`InMemoryTaskStore`]: a single-lock store for tests and embedded use

pub mod collaborators;
pub mod connection;
pub mod memory;
pub mod migrator;
pub mod postgres;

use crate::error::Result;
use crate::models::{NewTask, Task, TaskResolution};
use crate::state_machine::TaskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

/// Predicate for bulk deletion of terminal records
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPurgeFilter {
    /// Only rows in one of these statuses are deleted
    pub statuses: Vec<TaskStatus>,
    /// Only rows whose `completed_at` is strictly before this instant are deleted
    pub completed_before: DateTime<Utc>,
}

/// Outcome of a stale-processing sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleReclaim {
    /// Rows returned to `queued` because attempts remain
    pub requeued: u64,
    /// Rows moved to terminal `failed` because attempts are exhausted
    pub failed: u64,
}

impl StaleReclaim {
    pub fn total(&self) -> u64 {
        self.requeued + self.failed
    }
}

/// Count of tasks for one (type, status) pair, used by analysis summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskActivityCount {
    pub task_type: String,
    pub status: TaskStatus,
    pub count: i64,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new queued task
    async fn enqueue(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task>;

    async fn find(&self, id: Uuid) -> Result<Option<Task>>;

    /// Select up to `limit` due tasks and mark them `processing`
    ///
    /// Due means `status = queued`, `scheduled_for <= now` and attempts left. Selection
    /// and the transition (`attempts + 1`, `started_at = now`) are atomic: overlapping
    /// callers never receive the same task. Results are ordered by priority ascending,
    /// then `scheduled_for` ascending.
    async fn claim_batch(&self, limit: u32, now: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Persist the final state of a claimed attempt
    ///
    /// Conditional on the row still being `processing` with the attempt count observed
    /// at claim time. Returns `false` when that no longer holds (e.g. it was reclaimed as
    /// stale in the meantime) and nothing was written.
    async fn resolve(&self, task: &Task, resolution: &TaskResolution) -> Result<bool>;

    /// Recover tasks left in `processing` since before `started_before`
    async fn reclaim_stale(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
        message: &str,
    ) -> Result<StaleReclaim>;

    /// Operator cancellation; only a `queued` task can be cancelled
    async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Delete terminal records matching the filter, returning the number removed
    async fn delete_matching(&self, filter: &TaskPurgeFilter) -> Result<u64>;

    /// Task counts by type and status for rows created since `since`
    async fn activity_since(&self, since: DateTime<Utc>) -> Result<Vec<TaskActivityCount>>;

    /// Cheap reachability check for readiness probes
    async fn health_check(&self) -> Result<()>;
}
