//! # Task Engine Configuration
//!
//! Layered configuration for the engine and its entry points.
//!
//! ## Architecture
//!
//! - **Built-in defaults**: every field has a default, so an empty directory is valid
//! - **YAML files**: `tasker-queue.yaml`, then `tasker-queue.{environment}.yaml`
//! - **Environment variables**: `TASKER_QUEUE__ENGINE__DEFAULT_BATCH_SIZE=25` style overrides
//! - **Explicit validation**: invalid values fail at load time, never at claim time
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_queue::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().engine.default_batch_size;
//! let budget = manager.config().engine.run_budget();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::constants::system;
use crate::error::{Result, TaskerError};
use crate::orchestration::backoff_calculator::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration structure mirroring tasker-queue.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskerQueueConfig {
    /// Database connection and pooling configuration
    pub database: DatabaseConfig,

    /// Claiming, budgets and staleness
    pub engine: EngineConfig,

    /// Retry policies applied after failed attempts
    pub retry: RetryConfig,

    /// Structured logging output
    pub logging: LoggingConfig,

    /// HTTP trigger endpoint
    pub web: WebConfig,
}

impl TaskerQueueConfig {
    /// Check cross-field invariants after all layers are merged
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.retry.default.validate()?;
        for (task_type, policy) in &self.retry.overrides {
            policy.validate().map_err(|e| {
                TaskerError::ConfigurationError(format!("retry.overrides.{task_type}: {e}"))
            })?;
        }
        if self.database.max_connections == 0 {
            return Err(TaskerError::ConfigurationError(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Database connection and pooling configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; `${DATABASE_URL}` (or empty) defers to the environment
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Run embedded migrations when the store is bootstrapped
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Some("${DATABASE_URL}".to_string()),
            max_connections: 5,
            acquire_timeout_seconds: 10,
            run_migrations: false,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL, expanding `${DATABASE_URL}`
    pub fn database_url(&self) -> Result<String> {
        match self.url.as_deref() {
            Some(url) if !url.is_empty() && url != "${DATABASE_URL}" => Ok(url.to_string()),
            _ => std::env::var("DATABASE_URL").map_err(|_| {
                TaskerError::ConfigurationError(
                    "database.url is not set and DATABASE_URL is not defined".to_string(),
                )
            }),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Batch engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Limit used when the trigger does not pass one
    pub default_batch_size: u32,
    /// Hard cap applied to every requested limit
    pub max_batch_size: u32,
    /// Wall-clock budget for one `run_batch` invocation
    pub run_budget_seconds: u64,
    /// Upper bound for a single handler call
    pub handler_timeout_seconds: u64,
    /// `processing` rows older than this are reclaimed at the start of a run
    ///
    /// Must exceed `run_budget_seconds + handler_timeout_seconds`: a task claimed at the
    /// start of a run can wait out the whole budget before it starts, then run for the
    /// full handler timeout, and must not be reclaimed by an overlapping run meanwhile.
    pub stale_processing_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_batch_size: system::DEFAULT_BATCH_SIZE,
            max_batch_size: system::MAX_BATCH_SIZE,
            run_budget_seconds: system::DEFAULT_RUN_BUDGET_SECONDS,
            handler_timeout_seconds: system::DEFAULT_HANDLER_TIMEOUT_SECONDS,
            stale_processing_timeout_seconds: system::DEFAULT_STALE_PROCESSING_TIMEOUT_SECONDS,
        }
    }
}

impl EngineConfig {
    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_seconds)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }

    pub fn stale_processing_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_processing_timeout_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 || self.max_batch_size == 0 {
            return Err(TaskerError::ConfigurationError(
                "engine batch sizes must be positive".to_string(),
            ));
        }
        if self.default_batch_size > self.max_batch_size {
            return Err(TaskerError::ConfigurationError(format!(
                "engine.default_batch_size ({}) exceeds engine.max_batch_size ({})",
                self.default_batch_size, self.max_batch_size
            )));
        }
        if self.handler_timeout_seconds == 0 || self.run_budget_seconds == 0 {
            return Err(TaskerError::ConfigurationError(
                "engine timeouts must be positive".to_string(),
            ));
        }
        let longest_hold = self
            .run_budget_seconds
            .saturating_add(self.handler_timeout_seconds);
        if self.stale_processing_timeout_seconds <= longest_hold {
            return Err(TaskerError::ConfigurationError(format!(
                "engine.stale_processing_timeout_seconds ({}) must exceed engine.run_budget_seconds + engine.handler_timeout_seconds ({longest_hold})",
                self.stale_processing_timeout_seconds
            )));
        }
        Ok(())
    }
}

/// Retry policy table, keyed by task type name
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub default: RetryPolicy,
    pub overrides: HashMap<String, RetryPolicy>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    /// Bearer token required by the run endpoint; disabled when absent
    pub auth_token: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            auth_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TaskerQueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.default_batch_size, 10);
        assert_eq!(config.retry.default, RetryPolicy::default());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = TaskerQueueConfig::default();
        config.engine.default_batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(TaskerError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_stale_timeout_must_cover_handler_timeout() {
        let mut config = TaskerQueueConfig::default();
        config.engine.handler_timeout_seconds = 600;
        config.engine.stale_processing_timeout_seconds = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stale_timeout_must_cover_budget_plus_handler_timeout() {
        let mut engine = EngineConfig {
            run_budget_seconds: 2000,
            handler_timeout_seconds: 120,
            stale_processing_timeout_seconds: 900,
            ..EngineConfig::default()
        };
        assert!(matches!(
            engine.validate(),
            Err(TaskerError::ConfigurationError(message)) if message.contains("(2120)")
        ));

        engine.stale_processing_timeout_seconds = 2120;
        assert!(engine.validate().is_err());

        engine.stale_processing_timeout_seconds = 2121;
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn test_explicit_database_url_wins() {
        let config = DatabaseConfig {
            url: Some("postgresql://localhost/tasker_queue_test".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            config.database_url().unwrap(),
            "postgresql://localhost/tasker_queue_test"
        );
    }
}
