//! # Backoff Calculator
//!
//! Named retry-delay policies for failed task attempts.
//!
//! A failed attempt that still has attempts remaining is requeued with
//! `scheduled_for = now + delay`. The delay comes from a [`RetryPolicy`] selected per
//! task type, falling back to the configured default (a flat five minute delay).

use crate::config::RetryConfig;
use crate::constants::system;
use crate::error::{Result, TaskerError};
use crate::models::TaskType;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delay strategy applied between a failed attempt and the next claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Same delay after every failed attempt
    Constant { delay_seconds: u64 },
    /// `base_delay * multiplier^(attempt - 1)`, capped at `max_delay_seconds`
    Exponential {
        base_delay_seconds: u64,
        multiplier: f64,
        max_delay_seconds: u64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Constant {
            delay_seconds: system::DEFAULT_RETRY_DELAY_SECONDS,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next claim, given the attempt number that just failed (1-based)
    pub fn delay_for(&self, attempt: i32) -> Duration {
        match self {
            Self::Constant { delay_seconds } => seconds(*delay_seconds),
            Self::Exponential {
                base_delay_seconds,
                multiplier,
                max_delay_seconds,
            } => {
                let exponent = (attempt.max(1) - 1).min(63);
                let raw = *base_delay_seconds as f64 * multiplier.powi(exponent);
                let capped = if raw.is_finite() {
                    raw.min(*max_delay_seconds as f64)
                } else {
                    *max_delay_seconds as f64
                };
                seconds(capped as u64)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Constant { .. } => Ok(()),
            Self::Exponential {
                base_delay_seconds,
                multiplier,
                max_delay_seconds,
            } => {
                if !multiplier.is_finite() || *multiplier < 1.0 {
                    return Err(TaskerError::ConfigurationError(format!(
                        "exponential retry multiplier must be >= 1.0, got {multiplier}"
                    )));
                }
                if max_delay_seconds < base_delay_seconds {
                    return Err(TaskerError::ConfigurationError(format!(
                        "max_delay_seconds ({max_delay_seconds}) is below base_delay_seconds ({base_delay_seconds})"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn seconds(value: u64) -> Duration {
    // chrono::Duration is millisecond-bounded
    Duration::seconds(value.min(i64::MAX as u64 / 1_000) as i64)
}

/// Resolved policy table: one default plus per-task-type overrides
#[derive(Debug, Clone, Default)]
pub struct BackoffCalculator {
    default_policy: RetryPolicy,
    overrides: HashMap<TaskType, RetryPolicy>,
}

impl BackoffCalculator {
    pub fn new(default_policy: RetryPolicy) -> Self {
        Self {
            default_policy,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, task_type: TaskType, policy: RetryPolicy) -> Self {
        self.overrides.insert(task_type, policy);
        self
    }

    /// Build from configuration; override keys must name a known task type
    pub fn from_config(config: &RetryConfig) -> Result<Self> {
        config.default.validate()?;
        let mut calculator = Self::new(config.default.clone());
        for (key, policy) in &config.overrides {
            let task_type: TaskType = key.parse().map_err(|_| {
                TaskerError::ConfigurationError(format!(
                    "retry override configured for unknown task type '{key}'"
                ))
            })?;
            policy.validate()?;
            calculator.overrides.insert(task_type, policy.clone());
        }
        Ok(calculator)
    }

    /// Policy for a task type; unresolvable types use the default
    pub fn policy_for(&self, task_type: Option<TaskType>) -> &RetryPolicy {
        task_type
            .and_then(|t| self.overrides.get(&t))
            .unwrap_or(&self.default_policy)
    }

    pub fn delay_for(&self, task_type: Option<TaskType>, attempt: i32) -> Duration {
        self.policy_for(task_type).delay_for(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_flat_five_minutes() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::seconds(300));
        assert_eq!(policy.delay_for(7), Duration::seconds(300));
    }

    #[test]
    fn test_exponential_policy_growth_and_cap() {
        let policy = RetryPolicy::Exponential {
            base_delay_seconds: 10,
            multiplier: 2.0,
            max_delay_seconds: 60,
        };
        assert_eq!(policy.delay_for(1), Duration::seconds(10));
        assert_eq!(policy.delay_for(2), Duration::seconds(20));
        assert_eq!(policy.delay_for(3), Duration::seconds(40));
        assert_eq!(policy.delay_for(4), Duration::seconds(60));
        assert_eq!(policy.delay_for(500), Duration::seconds(60));
    }

    #[test]
    fn test_exponential_policy_validation() {
        let bad_multiplier = RetryPolicy::Exponential {
            base_delay_seconds: 10,
            multiplier: 0.5,
            max_delay_seconds: 60,
        };
        assert!(bad_multiplier.validate().is_err());

        let inverted = RetryPolicy::Exponential {
            base_delay_seconds: 100,
            multiplier: 2.0,
            max_delay_seconds: 60,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_overrides_apply_per_task_type() {
        let calculator = BackoffCalculator::new(RetryPolicy::default()).with_override(
            TaskType::Notification,
            RetryPolicy::Constant { delay_seconds: 30 },
        );
        assert_eq!(
            calculator.delay_for(Some(TaskType::Notification), 1),
            Duration::seconds(30)
        );
        assert_eq!(
            calculator.delay_for(Some(TaskType::Analysis), 1),
            Duration::seconds(300)
        );
        assert_eq!(calculator.delay_for(None, 1), Duration::seconds(300));
    }

    #[test]
    fn test_from_config_rejects_unknown_override() {
        let mut config = RetryConfig::default();
        config
            .overrides
            .insert("telepathy".to_string(), RetryPolicy::default());
        assert!(matches!(
            BackoffCalculator::from_config(&config),
            Err(TaskerError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_policy_serde_shape() {
        let policy: RetryPolicy = serde_json::from_value(serde_json::json!({
            "strategy": "exponential",
            "base_delay_seconds": 5,
            "multiplier": 3.0,
            "max_delay_seconds": 600
        }))
        .unwrap();
        assert_eq!(policy.delay_for(2), Duration::seconds(15));
    }
}
