//! # PostgreSQL Task Store
//!
//! [`TaskStore`] backed by the `tasker_queue_tasks` table.
//!
//! ## Claiming
//!
//! Claims select due rows with `FOR UPDATE SKIP LOCKED` and flip them to `processing`
//! in the same statement, so overlapping cron runs (or several processes) never see
//! the same row. The `status = 'queued'` recheck in the outer `UPDATE` keeps the
//! statement correct even without row locks (e.g. under statement-level retries).
//!
//! ## Resolution
//!
//! Results are written with a conditional update keyed on `(id, status, attempts)`.
//! A row that was reclaimed as stale while its handler was still running is left alone.
//! `result` is overwritten on every resolution, so it always reflects the latest attempt.

use super::{StaleReclaim, TaskActivityCount, TaskPurgeFilter, TaskStore};
use crate::error::{Result, TaskerError};
use crate::logging::log_error;
use crate::models::{NewTask, Task, TaskResolution};
use crate::state_machine::TaskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, task_type, task_name, parameters, priority, scheduled_for, \
    status, attempts, max_attempts, started_at, completed_at, result, error_message, \
    created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Internal struct for SQL query results
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    task_type: String,
    task_name: String,
    parameters: Value,
    priority: i32,
    scheduled_for: DateTime<Utc>,
    status: String,
    attempts: i32,
    max_attempts: i32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<Value>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskerError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let status: TaskStatus = row.status.parse().map_err(TaskerError::DatabaseError)?;
        Ok(Task {
            id: row.id,
            task_type: row.task_type,
            task_name: row.task_name,
            parameters: row.parameters,
            priority: row.priority,
            scheduled_for: row.scheduled_for,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            started_at: row.started_at,
            completed_at: row.completed_at,
            result: row.result,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn db_error(operation: &str) -> impl FnOnce(sqlx::Error) -> TaskerError + '_ {
    move |e| {
        log_error("pg_task_store", operation, &e.to_string(), None);
        TaskerError::DatabaseError(format!("{operation} failed: {e}"))
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn enqueue(&self, new_task: NewTask, now: DateTime<Utc>) -> Result<Task> {
        let task = new_task.into_task(now)?;
        let query = format!(
            "INSERT INTO tasker_queue_tasks ({TASK_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {TASK_COLUMNS}"
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(task.id)
            .bind(&task.task_type)
            .bind(&task.task_name)
            .bind(&task.parameters)
            .bind(task.priority)
            .bind(task.scheduled_for)
            .bind(task.status.as_str())
            .bind(task.attempts)
            .bind(task.max_attempts)
            .bind(task.started_at)
            .bind(task.completed_at)
            .bind(&task.result)
            .bind(&task.error_message)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("enqueue"))?;

        row.try_into()
    }

    async fn find(&self, id: Uuid) -> Result<Option<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasker_queue_tasks WHERE id = $1");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find"))?
            .map(Task::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn claim_batch(&self, limit: u32, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let query = format!(
            r#"
            WITH candidates AS (
                SELECT id
                FROM tasker_queue_tasks
                WHERE status = 'queued'
                  AND scheduled_for <= $1
                  AND attempts < max_attempts
                ORDER BY priority ASC, scheduled_for ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE tasker_queue_tasks AS t
            SET status = 'processing',
                attempts = t.attempts + 1,
                started_at = $1,
                completed_at = NULL,
                updated_at = $1
            FROM candidates
            WHERE t.id = candidates.id
              AND t.status = 'queued'
            RETURNING {}
            "#,
            TASK_COLUMNS
                .split(", ")
                .map(|column| format!("t.{}", column.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(now)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("claim_batch"))?;

        let mut tasks = rows
            .into_iter()
            .map(Task::try_from)
            .collect::<Result<Vec<_>>>()?;
        // RETURNING carries no ordering guarantee
        tasks.sort_by_key(Task::claim_order);

        debug!(claimed = tasks.len(), "Claimed tasks from PostgreSQL store");
        Ok(tasks)
    }

    async fn resolve(&self, task: &Task, resolution: &TaskResolution) -> Result<bool> {
        let (completed_at, scheduled_for) = match resolution {
            TaskResolution::Completed { completed_at, .. }
            | TaskResolution::Failed { completed_at, .. } => (*completed_at, None),
            TaskResolution::Requeued {
                completed_at,
                scheduled_for,
                ..
            } => (*completed_at, Some(*scheduled_for)),
        };

        let outcome = sqlx::query(
            r#"
            UPDATE tasker_queue_tasks
            SET status = $3,
                completed_at = $4,
                result = $5,
                error_message = $6,
                scheduled_for = COALESCE($7, scheduled_for),
                updated_at = $4
            WHERE id = $1
              AND status = 'processing'
              AND attempts = $2
            "#,
        )
        .bind(task.id)
        .bind(task.attempts)
        .bind(resolution.status().as_str())
        .bind(completed_at)
        .bind(resolution.result().cloned())
        .bind(resolution.error_message())
        .bind(scheduled_for)
        .execute(&self.pool)
        .await
        .map_err(db_error("resolve"))?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn reclaim_stale(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
        message: &str,
    ) -> Result<StaleReclaim> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            UPDATE tasker_queue_tasks
            SET status = CASE WHEN attempts < max_attempts THEN 'queued' ELSE 'failed' END,
                scheduled_for = CASE WHEN attempts < max_attempts THEN $2 ELSE scheduled_for END,
                completed_at = CASE WHEN attempts < max_attempts THEN completed_at ELSE $2 END,
                error_message = $3,
                updated_at = $2
            WHERE status = 'processing'
              AND started_at < $1
            RETURNING status
            "#,
        )
        .bind(started_before)
        .bind(now)
        .bind(message)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("reclaim_stale"))?;

        let mut outcome = StaleReclaim::default();
        for (status,) in rows {
            if status == TaskStatus::Queued.as_str() {
                outcome.requeued += 1;
            } else {
                outcome.failed += 1;
            }
        }
        Ok(outcome)
    }

    async fn cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE tasker_queue_tasks
            SET status = 'cancelled', completed_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error("cancel"))?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn delete_matching(&self, filter: &TaskPurgeFilter) -> Result<u64> {
        let statuses: Vec<String> = filter
            .statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let outcome = sqlx::query(
            r#"
            DELETE FROM tasker_queue_tasks
            WHERE status = ANY($1)
              AND completed_at < $2
            "#,
        )
        .bind(&statuses)
        .bind(filter.completed_before)
        .execute(&self.pool)
        .await
        .map_err(db_error("delete_matching"))?;

        Ok(outcome.rows_affected())
    }

    async fn activity_since(&self, since: DateTime<Utc>) -> Result<Vec<TaskActivityCount>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT task_type, status, COUNT(*)::BIGINT
            FROM tasker_queue_tasks
            WHERE created_at >= $1
            GROUP BY task_type, status
            ORDER BY task_type, status
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("activity_since"))?;

        rows.into_iter()
            .map(|(task_type, status, count)| {
                Ok(TaskActivityCount {
                    task_type,
                    status: status.parse().map_err(TaskerError::DatabaseError)?,
                    count,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> Result<()> {
        super::connection::ping(&self.pool).await
    }
}
