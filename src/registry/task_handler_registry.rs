//! # Handler Registry
//!
//! Closed map from [`TaskType`] to its handler. The registry is assembled once at
//! startup through [`HandlerRegistryBuilder`]; `build()` refuses to produce a registry
//! that leaves any task type without a handler, so a missing handler is a deployment
//! error instead of a runtime surprise.

use super::handler::TaskHandler;
use crate::error::{Result, TaskerError};
use crate::models::TaskType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .field("task_types", &self.task_types())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Look up the handler for a resolved task type
    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type).cloned()
    }

    pub fn is_registered(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }

    /// Registered task types in declaration order
    pub fn task_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    duplicates: Vec<TaskType>,
}

impl HandlerRegistryBuilder {
    /// Register a handler under the type it reports
    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        let task_type = handler.task_type();
        if self.handlers.insert(task_type, handler).is_some() {
            self.duplicates.push(task_type);
        }
        self
    }

    /// Finish registration, requiring exactly one handler per task type
    pub fn build(self) -> Result<HandlerRegistry> {
        let missing: Vec<&str> = TaskType::ALL
            .iter()
            .filter(|task_type| !self.handlers.contains_key(*task_type))
            .map(TaskType::as_str)
            .collect();

        let mut problems = Vec::new();
        if !missing.is_empty() {
            problems.push(format!("no handler registered for: {}", missing.join(", ")));
        }
        if !self.duplicates.is_empty() {
            let duplicates: Vec<&str> = self.duplicates.iter().map(TaskType::as_str).collect();
            problems.push(format!(
                "multiple handlers registered for: {}",
                duplicates.join(", ")
            ));
        }
        if !problems.is_empty() {
            return Err(TaskerError::ConfigurationError(format!(
                "Handler registry incomplete: {}",
                problems.join("; ")
            )));
        }

        info!(
            handler_count = self.handlers.len(),
            "Handler registry built"
        );
        Ok(HandlerRegistry {
            handlers: self.handlers,
        })
    }
}
