//! # Analysis Handler
//!
//! Read-only activity summary over a recent window: task counts by status and by
//! type, and the success rate among tasks that reached a terminal outcome.

use crate::database::{TaskActivityCount, TaskStore};
use crate::models::TaskType;
use crate::orchestration::Clock;
use crate::registry::{parse_parameters, HandlerOutcome, TaskHandler};
use crate::state_machine::TaskStatus;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_WINDOW_HOURS: i64 = 24;
pub const MAX_WINDOW_HOURS: i64 = 168;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisParams {
    #[serde(default)]
    pub window_hours: Option<i64>,
}

#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn task_activity_since(&self, since: DateTime<Utc>) -> Result<Vec<TaskActivityCount>>;
}

/// [`AnalyticsSource`] reading straight from the task store
pub struct TaskStoreAnalytics {
    store: Arc<dyn TaskStore>,
}

impl TaskStoreAnalytics {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AnalyticsSource for TaskStoreAnalytics {
    async fn task_activity_since(&self, since: DateTime<Utc>) -> Result<Vec<TaskActivityCount>> {
        Ok(self.store.activity_since(since).await?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub window_hours: i64,
    pub since: DateTime<Utc>,
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, BTreeMap<String, i64>>,
    /// completed / (completed + failed); absent when nothing finished in the window
    pub success_rate: Option<f64>,
}

impl ActivitySummary {
    fn from_counts(window_hours: i64, since: DateTime<Utc>, counts: &[TaskActivityCount]) -> Self {
        let mut by_status: BTreeMap<String, i64> = BTreeMap::new();
        let mut by_type: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
        for count in counts {
            *by_status.entry(count.status.to_string()).or_default() += count.count;
            *by_type
                .entry(count.task_type.clone())
                .or_default()
                .entry(count.status.to_string())
                .or_default() += count.count;
        }

        let count_of = |status: TaskStatus| by_status.get(status.as_str()).copied().unwrap_or(0);
        let completed = count_of(TaskStatus::Completed);
        let finished = completed + count_of(TaskStatus::Failed);
        let success_rate = (finished > 0).then(|| completed as f64 / finished as f64);

        Self {
            window_hours,
            since,
            total: by_status.values().sum(),
            by_status,
            by_type,
            success_rate,
        }
    }
}

pub struct AnalysisHandler {
    source: Arc<dyn AnalyticsSource>,
    clock: Arc<dyn Clock>,
}

impl AnalysisHandler {
    pub fn new(source: Arc<dyn AnalyticsSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }
}

#[async_trait]
impl TaskHandler for AnalysisHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Analysis
    }

    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome> {
        let params: AnalysisParams = parse_parameters(self.task_type(), parameters)?;
        let window_hours = params
            .window_hours
            .unwrap_or(DEFAULT_WINDOW_HOURS)
            .clamp(1, MAX_WINDOW_HOURS);
        let since = self.clock.now() - Duration::hours(window_hours);

        let counts = self.source.task_activity_since(since).await?;
        let summary = ActivitySummary::from_counts(window_hours, since, &counts);

        let message = match summary.success_rate {
            Some(rate) => format!(
                "analyzed {} tasks over the last {window_hours}h ({:.1}% success)",
                summary.total,
                rate * 100.0
            ),
            None => format!(
                "analyzed {} tasks over the last {window_hours}h",
                summary.total
            ),
        };
        Ok(HandlerOutcome::success(
            message,
            Some(serde_json::to_value(&summary)?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryTaskStore;
    use crate::models::{NewTask, Task};
    use crate::orchestration::ManualClock;
    use serde_json::json;

    fn task(task_type: TaskType, status: TaskStatus, created_at: DateTime<Utc>) -> Task {
        let mut task = NewTask::new(task_type, "t", json!({}))
            .into_task(created_at)
            .unwrap();
        task.status = status;
        task
    }

    fn handler(store: Arc<InMemoryTaskStore>, clock: Arc<ManualClock>) -> AnalysisHandler {
        AnalysisHandler::new(Arc::new(TaskStoreAnalytics::new(store)), clock)
    }

    #[tokio::test]
    async fn test_summarizes_window() {
        let clock = Arc::new(ManualClock::default());
        let now = clock.now();
        let store = Arc::new(InMemoryTaskStore::new());
        store.insert_raw(task(TaskType::Notification, TaskStatus::Completed, now - Duration::hours(1)));
        store.insert_raw(task(TaskType::Notification, TaskStatus::Completed, now - Duration::hours(2)));
        store.insert_raw(task(TaskType::Maintenance, TaskStatus::Failed, now - Duration::hours(3)));
        store.insert_raw(task(TaskType::Maintenance, TaskStatus::Queued, now - Duration::hours(4)));
        store.insert_raw(task(TaskType::Analysis, TaskStatus::Failed, now - Duration::hours(48)));

        let outcome = handler(store, clock).call(&json!({})).await.unwrap();
        assert!(outcome.success);

        let summary: ActivitySummary = serde_json::from_value(outcome.data.unwrap()).unwrap();
        assert_eq!(summary.window_hours, 24);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.by_status["completed"], 2);
        assert_eq!(summary.by_type["maintenance"]["queued"], 1);
        assert!(!summary.by_type.contains_key("analysis"));
        let rate = summary.success_rate.unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_window_is_clamped() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryTaskStore::new());
        let outcome = handler(store, clock)
            .call(&json!({"window_hours": 10_000}))
            .await
            .unwrap();
        assert_eq!(outcome.data.unwrap()["window_hours"], MAX_WINDOW_HOURS);
        assert!(outcome.message.ends_with("last 168h"));
    }

    #[tokio::test]
    async fn test_unreachable_source_is_an_error() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.set_available(false);
        let result = handler(store, Arc::new(ManualClock::default()))
            .call(&json!({}))
            .await;
        assert!(result.is_err());
    }
}
