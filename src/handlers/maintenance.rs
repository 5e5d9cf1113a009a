//! # Maintenance Handler
//!
//! Self-maintenance of the engine's own records, run as an ordinary task so it is
//! scheduled, retried and summarized like everything else.
//!
//! - `cleanup_old_tasks`: delete `completed` and `cancelled` tasks finished more than
//!   [`TASK_RETENTION_DAYS`] ago. `failed` tasks are kept for operators.
//! - `cleanup_health_checks`: delete health-check records older than
//!   [`HEALTH_CHECK_RETENTION_DAYS`]
//! - `full_cleanup`: both

use crate::database::{TaskPurgeFilter, TaskStore};
use crate::models::TaskType;
use crate::orchestration::Clock;
use crate::registry::{parse_parameters, HandlerOutcome, TaskHandler};
use crate::state_machine::TaskStatus;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const TASK_RETENTION_DAYS: i64 = 30;
pub const HEALTH_CHECK_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    CleanupOldTasks,
    CleanupHealthChecks,
    FullCleanup,
}

impl MaintenanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CleanupOldTasks => "cleanup_old_tasks",
            Self::CleanupHealthChecks => "cleanup_health_checks",
            Self::FullCleanup => "full_cleanup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaintenanceParams {
    pub action: MaintenanceAction,
}

#[async_trait]
pub trait HealthCheckLog: Send + Sync {
    /// Delete records checked before `before`, returning how many were removed
    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64>;
}

pub struct MaintenanceHandler {
    store: Arc<dyn TaskStore>,
    health_checks: Arc<dyn HealthCheckLog>,
    clock: Arc<dyn Clock>,
}

impl MaintenanceHandler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        health_checks: Arc<dyn HealthCheckLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            health_checks,
            clock,
        }
    }

    async fn cleanup_old_tasks(&self, now: DateTime<Utc>) -> Result<u64> {
        let filter = TaskPurgeFilter {
            statuses: vec![TaskStatus::Completed, TaskStatus::Cancelled],
            completed_before: now - Duration::days(TASK_RETENTION_DAYS),
        };
        Ok(self.store.delete_matching(&filter).await?)
    }

    async fn cleanup_health_checks(&self, now: DateTime<Utc>) -> Result<u64> {
        self.health_checks
            .delete_before(now - Duration::days(HEALTH_CHECK_RETENTION_DAYS))
            .await
    }
}

#[async_trait]
impl TaskHandler for MaintenanceHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Maintenance
    }

    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome> {
        let params: MaintenanceParams = parse_parameters(self.task_type(), parameters)?;
        let now = self.clock.now();

        let (tasks_deleted, health_checks_deleted) = match params.action {
            MaintenanceAction::CleanupOldTasks => (Some(self.cleanup_old_tasks(now).await?), None),
            MaintenanceAction::CleanupHealthChecks => {
                (None, Some(self.cleanup_health_checks(now).await?))
            }
            MaintenanceAction::FullCleanup => (
                Some(self.cleanup_old_tasks(now).await?),
                Some(self.cleanup_health_checks(now).await?),
            ),
        };
        let deleted = tasks_deleted.unwrap_or(0) + health_checks_deleted.unwrap_or(0);

        info!(
            action = params.action.as_str(),
            tasks_deleted = ?tasks_deleted,
            health_checks_deleted = ?health_checks_deleted,
            "Maintenance completed"
        );

        Ok(HandlerOutcome::success(
            format!("{}: deleted {deleted} records", params.action.as_str()),
            Some(json!({
                "action": params.action,
                "deleted": deleted,
                "tasks_deleted": tasks_deleted,
                "health_checks_deleted": health_checks_deleted,
            })),
        ))
    }
}
