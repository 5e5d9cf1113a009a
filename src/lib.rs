#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Queue
//!
//! Single-process background task engine: claims due tasks by priority, dispatches them
//! to typed handlers, applies retry policies to failures and reports a summary per run.
//!
//! ## Overview
//!
//! An external scheduler (cron, a CronJob, a platform scheduler) triggers a batch run
//! through the CLI or the HTTP endpoint. Each run:
//!
//! 1. returns tasks stranded in `processing` by earlier runs to the queue
//! 2. atomically claims up to `limit` due tasks, lowest `priority` first
//! 3. runs each task's handler in claim order under a wall-clock budget
//! 4. completes, requeues (with backoff) or fails each task
//! 5. returns a [`BatchSummary`](orchestration::BatchSummary)
//!
//! Delivery is at-least-once: a task whose run crashed is executed again after the
//! stale timeout, so handlers are written to be idempotent.
//!
//! ## Module Organization
//!
//! - [`models`] - Task records, task types and resolutions
//! - [`database`] - `TaskStore` trait with PostgreSQL and in-memory implementations
//! - [`state_machine`] - Task status transitions
//! - [`registry`] - Handler contract and the startup-checked registry
//! - [`orchestration`] - Claimer, dispatcher, retry manager and batch runner
//! - [`handlers`] - Built-in handlers for every task type
//! - [`config`] - Layered YAML/environment configuration
//! - [`web`] - HTTP trigger and health probes
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_queue::bootstrap::bootstrap;
//! use tasker_queue::config::ConfigManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = bootstrap(ConfigManager::load()?).await?;
//! let summary = engine.runner.run_default_batch().await?;
//! println!("{} processed, {} failed", summary.processed, summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Engine behaviour is covered against [`database::InMemoryTaskStore`] with a
//! [`orchestration::ManualClock`]. PostgreSQL tests are `#[ignore]`d and need
//! `DATABASE_URL`:
//!
//! ```bash
//! cargo test -- --ignored
//! ```

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod web;

pub use constants::TaskStatus;
pub use database::{InMemoryTaskStore, PgTaskStore, TaskStore};
pub use error::{Result, TaskerError};
pub use models::{NewTask, Task, TaskResolution, TaskType};
pub use orchestration::{BatchRunner, BatchSummary, RetryPolicy};
pub use registry::{HandlerOutcome, HandlerRegistry, TaskHandler};
