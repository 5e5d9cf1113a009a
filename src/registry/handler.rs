//! # Task Handler Contract
//!
//! Every task type is served by exactly one [`TaskHandler`]. Handlers receive the task's
//! opaque `parameters` document, deserialize their own typed view of it, and report a
//! [`HandlerOutcome`].
//!
//! Returning `Err(_)` and returning a failure outcome are treated the same way by the
//! engine: the attempt failed and the retry policy decides what happens next. Use `Err`
//! for unexpected conditions (collaborator unreachable, malformed parameters) and a
//! failure outcome when the handler ran to completion but produced nothing useful.

use crate::models::TaskType;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task type this handler is registered for
    fn task_type(&self) -> TaskType;

    /// Execute one attempt
    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome>;
}

/// Result of one handler attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutcome {
    pub success: bool,
    pub message: String,
    /// Stored as the task `result` on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl HandlerOutcome {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Failure that still carries diagnostic data (e.g. per-recipient errors)
    pub fn failure_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Deserialize a handler's typed parameter view, naming the task type on failure
pub fn parse_parameters<T: serde::de::DeserializeOwned>(
    task_type: TaskType,
    parameters: &Value,
) -> Result<T> {
    // Producers commonly omit the document entirely for parameterless tasks
    let document = if parameters.is_null() {
        Value::Object(Default::default())
    } else {
        parameters.clone()
    };
    serde_json::from_value(document)
        .map_err(|e| anyhow::anyhow!("invalid {task_type} parameters: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Params {
        #[serde(default)]
        count: Option<u32>,
    }

    #[test]
    fn test_null_parameters_parse_as_empty_object() {
        let params: Params = parse_parameters(TaskType::Analysis, &Value::Null).unwrap();
        assert_eq!(params.count, None);
    }

    #[test]
    fn test_invalid_parameters_name_the_task_type() {
        let error = parse_parameters::<Params>(TaskType::Analysis, &json!({"count": "many"}))
            .unwrap_err();
        assert!(error.to_string().starts_with("invalid analysis parameters"));
    }

    #[test]
    fn test_outcome_serialization_omits_missing_data() {
        let value = serde_json::to_value(HandlerOutcome::failure("nope")).unwrap();
        assert_eq!(value, json!({"success": false, "message": "nope"}));
    }
}
