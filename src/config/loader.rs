//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery, environment
//! detection, and layering built-in defaults, files, and environment variables.

use super::TaskerQueueConfig;
use crate::error::{Result, TaskerError};
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "tasker-queue";
const ENV_PREFIX: &str = "TASKER_QUEUE";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TaskerQueueConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        let manager = ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        };

        debug!(
            config = %manager.debug_config(),
            "Configuration loaded successfully"
        );
        info!(
            environment = environment,
            max_batch_size = manager.config.engine.max_batch_size,
            run_budget_seconds = manager.config.engine.run_budget_seconds,
            "Task engine configuration loaded"
        );

        Ok(Arc::new(manager))
    }

    /// Wrap an already-built configuration (tests, embedding applications)
    pub fn from_config(config: TaskerQueueConfig, environment: &str) -> Result<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &TaskerQueueConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Get sanitized configuration for debugging/logging that masks sensitive fields
    pub fn debug_config(&self) -> serde_json::Value {
        sanitize_config_for_logging(&self.config)
    }

    /// Get current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("TASKER_QUEUE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> Result<TaskerQueueConfig> {
        let base_path = config_directory.join(format!("{BASE_FILE_STEM}.yaml"));
        let environment_path =
            config_directory.join(format!("{BASE_FILE_STEM}.{environment}.yaml"));

        debug!(
            base = %base_path.display(),
            environment_override = %environment_path.display(),
            "Resolving configuration layers"
        );

        let defaults = Config::try_from(&TaskerQueueConfig::default())?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_path.as_path()).required(false))
            .add_source(File::from(environment_path.as_path()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        merged.try_deserialize::<TaskerQueueConfig>().map_err(|e| {
            TaskerError::ConfigurationError(format!(
                "Invalid configuration in {}: {e}",
                config_directory.display()
            ))
        })
    }
}

/// Sanitize configuration for safe logging by masking sensitive fields
fn sanitize_config_for_logging(config: &TaskerQueueConfig) -> serde_json::Value {
    let mut config_json = serde_json::json!(config);
    let sensitive_patterns = ["password", "secret", "token", "credential", "url"];
    sanitize_json_recursive(&mut config_json, &sensitive_patterns);
    config_json
}

fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = sensitive_patterns
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if is_sensitive {
                    if let serde_json::Value::String(s) = val {
                        // Keep placeholders visible so operators can see env expansion
                        if !s.starts_with("${") {
                            *val = serde_json::Value::String("[MASKED]".to_string());
                        }
                    }
                } else {
                    sanitize_json_recursive(val, sensitive_patterns);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}
