//! # Batch Runner
//!
//! One invocation of the engine, as triggered by cron through the CLI or HTTP endpoint:
//!
//! 1. reclaim stale `processing` tasks
//! 2. claim up to `limit` due tasks
//! 3. dispatch each claimed task in claim order, sequentially
//! 4. resolve and persist each outcome through the retry manager
//! 5. return a [`BatchSummary`]
//!
//! The run budget is checked between tasks. Once it is spent, the remaining claimed
//! tasks are not started: they are reported as failed and stay `processing` until the
//! stale reclaim of a later run returns them to the queue. A task that has started is
//! never interrupted by the budget (its handler timeout still applies).
//!
//! A store failure while reclaiming or claiming surfaces to the caller as an error. Once
//! tasks are claimed the run always returns a report covering every one of them: if
//! persisting a result fails, that task and the ones not yet started are reported as
//! failed, the error is set on [`BatchSummary::infrastructure_error`] and the run stops.
//! Those tasks stay `processing` until a later stale reclaim.

use super::backoff_calculator::BackoffCalculator;
use super::clock::Clock;
use super::dispatcher::Dispatcher;
use super::retry_manager::RetryManager;
use super::task_claimer::TaskClaimer;
use super::types::{BatchSummary, TaskRunResult};
use crate::config::EngineConfig;
use crate::constants::messages;
use crate::database::TaskStore;
use crate::error::{Result, TaskerError};
use crate::logging::{log_error, log_task_operation};
use crate::registry::HandlerRegistry;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const RESULT_SUPERSEDED: &str = "result discarded: claim was reclaimed while running";

pub struct BatchRunner {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    claimer: TaskClaimer,
    dispatcher: Dispatcher,
    retry_manager: RetryManager,
    config: EngineConfig,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("config", &self.config)
            .field("registry", self.dispatcher.registry())
            .finish()
    }
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<HandlerRegistry>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        backoff: BackoffCalculator,
    ) -> Self {
        Self {
            claimer: TaskClaimer::new(store.clone(), clock.clone(), config.clone()),
            dispatcher: Dispatcher::new(registry, config.handler_timeout()),
            retry_manager: RetryManager::new(backoff),
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a batch with `engine.default_batch_size`
    pub async fn run_default_batch(&self) -> Result<BatchSummary> {
        self.run_batch(self.config.default_batch_size).await
    }

    #[instrument(skip(self))]
    pub async fn run_batch(&self, limit: u32) -> Result<BatchSummary> {
        let started = self.clock.now();
        let budget = Duration::from_std(self.config.run_budget())
            .map_err(|e| TaskerError::ConfigurationError(format!("run budget: {e}")))?;
        let deadline = started + budget;

        let mut summary = BatchSummary {
            reclaimed: self.claimer.reclaim_stale().await?.total(),
            ..BatchSummary::default()
        };

        let claimed = self.claimer.claim_batch(limit).await?;

        for (index, task) in claimed.iter().enumerate() {
            if self.clock.now() >= deadline {
                let remaining = &claimed[index..];
                warn!(
                    not_started = remaining.len(),
                    budget_seconds = self.config.run_budget_seconds,
                    "Run budget exceeded, leaving remaining tasks for stale reclaim"
                );
                summary.timed_out = true;
                summary.record_not_started(remaining, messages::RUN_BUDGET_EXCEEDED);
                break;
            }

            let outcome = self.dispatcher.dispatch(task).await;
            let (resolution, applied) = match self
                .retry_manager
                .record(&self.store, task, &outcome, self.clock.now())
                .await
            {
                Ok(recorded) => recorded,
                Err(e) => {
                    let remaining = &claimed[index + 1..];
                    log_error(
                        "batch_runner",
                        "record_result",
                        &e.to_string(),
                        Some(&format!("task_id={} not_started={}", task.id, remaining.len())),
                    );
                    summary.record(TaskRunResult::new(
                        task,
                        false,
                        format!("result not recorded: {e}"),
                    ));
                    summary.record_not_started(remaining, messages::STORE_UNAVAILABLE);
                    summary.infrastructure_error = Some(e.to_string());
                    break;
                }
            };

            log_task_operation(
                "execute",
                Some(task.id),
                Some(&task.task_name),
                Some(&task.task_type),
                resolution.status().as_str(),
                Some(&outcome.message),
            );

            let result = if applied {
                TaskRunResult::new(task, resolution.is_success(), outcome.message)
            } else {
                TaskRunResult::new(task, false, RESULT_SUPERSEDED)
            };
            summary.record(result);
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            reclaimed = summary.reclaimed,
            timed_out = summary.timed_out,
            infrastructure_error = summary.infrastructure_error.as_deref(),
            elapsed_ms = (self.clock.now() - started).num_milliseconds(),
            "Batch run finished"
        );
        Ok(summary)
    }
}
