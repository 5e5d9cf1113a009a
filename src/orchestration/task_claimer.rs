//! # Task Claimer
//!
//! Selects due tasks and marks them `processing` in one atomic store operation.
//!
//! ## Key Features
//!
//! - **Atomic Claiming**: selection and the `queued -> processing` transition happen
//!   together in the store, so two overlapping batch runs never receive the same task
//! - **Priority Ordering**: `priority` ascending, then `scheduled_for` ascending
//! - **Bounded Batches**: requested limits are clamped to `engine.max_batch_size`
//! - **Stale Recovery**: tasks stranded in `processing` by a crashed or over-budget run
//!   are returned to the queue (or failed, when out of attempts)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tasker_queue::config::EngineConfig;
//! use tasker_queue::database::InMemoryTaskStore;
//! use tasker_queue::orchestration::{SystemClock, TaskClaimer};
//!
//! # async fn example() -> tasker_queue::error::Result<()> {
//! let claimer = TaskClaimer::new(
//!     Arc::new(InMemoryTaskStore::new()),
//!     Arc::new(SystemClock),
//!     EngineConfig::default(),
//! );
//!
//! let claimed = claimer.claim_batch(5).await?;
//! for task in claimed {
//!     println!("claimed {} (attempt {})", task.id, task.attempts);
//! }
//! # Ok(())
//! # }
//! ```

use super::clock::Clock;
use crate::config::EngineConfig;
use crate::constants::messages;
use crate::database::{StaleReclaim, TaskStore};
use crate::error::{Result, TaskerError};
use crate::logging::log_error;
use crate::models::Task;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Task claiming component for the batch engine
#[derive(Clone)]
pub struct TaskClaimer {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for TaskClaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskClaimer")
            .field("max_batch_size", &self.config.max_batch_size)
            .field(
                "stale_processing_timeout_seconds",
                &self.config.stale_processing_timeout_seconds,
            )
            .finish()
    }
}

impl TaskClaimer {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Effective limit for a requested batch size
    ///
    /// Zero is rejected; anything above `max_batch_size` is clamped down to it.
    pub fn effective_limit(&self, requested: u32) -> Result<u32> {
        if requested == 0 {
            return Err(TaskerError::ValidationError(
                "batch limit must be positive".to_string(),
            ));
        }
        if requested > self.config.max_batch_size {
            warn!(
                requested,
                max_batch_size = self.config.max_batch_size,
                "Requested batch limit exceeds maximum, clamping"
            );
        }
        Ok(requested.min(self.config.max_batch_size))
    }

    /// Claim up to `limit` due tasks
    ///
    /// Returned tasks are already `processing` with `attempts` incremented and
    /// `started_at` set, in claim order. An unreachable store surfaces as an error and
    /// no task is returned.
    #[instrument(skip(self))]
    pub async fn claim_batch(&self, limit: u32) -> Result<Vec<Task>> {
        let limit = self.effective_limit(limit)?;
        let now = self.clock.now();

        let claimed = self.store.claim_batch(limit, now).await.map_err(|e| {
            log_error(
                "task_claimer",
                "claim_batch",
                &e.to_string(),
                Some(&format!("limit={limit}")),
            );
            e
        })?;

        if claimed.is_empty() {
            debug!(limit, "No due tasks to claim");
        } else {
            info!(
                limit,
                claimed = claimed.len(),
                "Claimed tasks for processing"
            );
        }
        Ok(claimed)
    }

    /// Recover tasks stuck in `processing` longer than the stale timeout
    #[instrument(skip(self))]
    pub async fn reclaim_stale(&self) -> Result<StaleReclaim> {
        let now = self.clock.now();
        let timeout = Duration::from_std(self.config.stale_processing_timeout())
            .map_err(|e| TaskerError::ConfigurationError(format!("stale timeout: {e}")))?;
        let started_before = now - timeout;

        let reclaimed = self
            .store
            .reclaim_stale(started_before, now, messages::STALE_RECLAIMED)
            .await
            .map_err(|e| {
                log_error("task_claimer", "reclaim_stale", &e.to_string(), None);
                e
            })?;

        if reclaimed.total() > 0 {
            warn!(
                requeued = reclaimed.requeued,
                failed = reclaimed.failed,
                started_before = %started_before,
                "Reclaimed stale processing tasks"
            );
        }
        Ok(reclaimed)
    }
}
