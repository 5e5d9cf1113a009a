//! # Engine Bootstrap
//!
//! Assembles a ready-to-run [`BatchRunner`] from configuration. Both entry points (the
//! CLI `run-batch` command and the HTTP server) go through here, so they always see
//! the same store, handlers and retry policies.

use crate::config::{ConfigManager, TaskerQueueConfig};
use crate::database::collaborators::{
    PgContentDrafts, PgHealthCheckLog, PgIncidents, PgNotificationOutbox,
};
use crate::database::{connection, migrator, PgTaskStore, TaskStore};
use crate::error::Result;
use crate::handlers::{register_builtin_handlers, HandlerCollaborators, TaskStoreAnalytics};
use crate::orchestration::{BackoffCalculator, BatchRunner, Clock, SystemClock};
use crate::registry::HandlerRegistry;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Handle to a bootstrapped engine
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub config_manager: Arc<ConfigManager>,
    pub pool: PgPool,
    pub runner: Arc<BatchRunner>,
}

impl EngineContext {
    pub fn config(&self) -> &TaskerQueueConfig {
        self.config_manager.config()
    }
}

/// Build a runner from already-constructed collaborators
pub fn build_runner(
    config: &TaskerQueueConfig,
    collaborators: &HandlerCollaborators,
) -> Result<BatchRunner> {
    let registry = register_builtin_handlers(HandlerRegistry::builder(), collaborators).build()?;
    let backoff = BackoffCalculator::from_config(&config.retry)?;
    Ok(BatchRunner::new(
        collaborators.store.clone(),
        Arc::new(registry),
        collaborators.clock.clone(),
        config.engine.clone(),
        backoff,
    ))
}

/// PostgreSQL-backed collaborators sharing one pool
pub fn postgres_collaborators(pool: &PgPool, clock: Arc<dyn Clock>) -> HandlerCollaborators {
    let store: Arc<dyn TaskStore> = Arc::new(PgTaskStore::new(pool.clone()));
    let incidents = Arc::new(PgIncidents::new(pool.clone()));
    HandlerCollaborators {
        analytics: Arc::new(TaskStoreAnalytics::new(store.clone())),
        store,
        clock,
        content: Arc::new(PgContentDrafts::new(pool.clone())),
        knowledge: incidents.clone(),
        incidents,
        notifier: Arc::new(PgNotificationOutbox::new(pool.clone())),
        health_checks: Arc::new(PgHealthCheckLog::new(pool.clone())),
    }
}

/// Connect, optionally migrate, and wire the engine against PostgreSQL
pub async fn bootstrap(config_manager: Arc<ConfigManager>) -> Result<EngineContext> {
    let config = config_manager.config();
    let pool = connection::connect(&config.database).await?;

    if config.database.run_migrations {
        migrator::run_migrations(&pool).await?;
    }

    let collaborators = postgres_collaborators(&pool, Arc::new(SystemClock));
    let runner = build_runner(config, &collaborators)?;

    info!(
        environment = config_manager.environment(),
        max_connections = config.database.max_connections,
        "Task engine bootstrapped"
    );

    Ok(EngineContext {
        config_manager,
        pool,
        runner: Arc::new(runner),
    })
}
