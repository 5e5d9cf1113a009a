//! # Dispatcher
//!
//! Routes a claimed task to the handler registered for its type and normalizes
//! everything that can go wrong inside a handler into a [`HandlerOutcome`]:
//!
//! - unresolvable `task_type`: failure `"unknown task type: X"`, no handler invoked
//! - `Err(_)` from the handler: failure carrying the error text
//! - handler panic: failure carrying the panic message
//! - handler still running after `engine.handler_timeout_seconds`: failure
//!
//! The dispatcher never returns an error; every outcome is attributable to the task.

use crate::constants::messages;
use crate::models::Task;
use crate::registry::{HandlerOutcome, HandlerRegistry};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, handler_timeout: Duration) -> Self {
        Self {
            registry,
            handler_timeout,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run the handler for one claimed task
    pub async fn dispatch(&self, task: &Task) -> HandlerOutcome {
        let task_type = match task.resolved_type() {
            Ok(task_type) => task_type,
            Err(_) => {
                warn!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    "No handler for task type"
                );
                return HandlerOutcome::failure(format!(
                    "{}: {}",
                    messages::UNKNOWN_TASK_TYPE,
                    task.task_type
                ));
            }
        };

        let Some(handler) = self.registry.get(task_type) else {
            // Only reachable with a registry built outside HandlerRegistryBuilder::build
            return HandlerOutcome::failure(format!(
                "{}: {}",
                messages::UNKNOWN_TASK_TYPE,
                task.task_type
            ));
        };

        debug!(
            task_id = %task.id,
            task_type = %task_type,
            attempt = task.attempts,
            "Dispatching task to handler"
        );

        let call = AssertUnwindSafe(handler.call(&task.parameters)).catch_unwind();
        match tokio::time::timeout(self.handler_timeout, call).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(handler_error))) => {
                warn!(
                    task_id = %task.id,
                    task_type = %task_type,
                    error = %handler_error,
                    "Handler returned an error"
                );
                HandlerOutcome::failure(format!("{handler_error:#}"))
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(
                    task_id = %task.id,
                    task_type = %task_type,
                    panic = %message,
                    "Handler panicked"
                );
                HandlerOutcome::failure(format!("handler panicked: {message}"))
            }
            Err(_) => {
                warn!(
                    task_id = %task.id,
                    task_type = %task_type,
                    timeout_seconds = self.handler_timeout.as_secs(),
                    "Handler timed out"
                );
                HandlerOutcome::failure(format!(
                    "handler timed out after {}s",
                    self.handler_timeout.as_secs()
                ))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, TaskType};
    use crate::registry::TaskHandler;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};

    enum Behaviour {
        Succeed,
        Error,
        Panic,
        Hang,
    }

    struct Scripted {
        task_type: TaskType,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl TaskHandler for Scripted {
        fn task_type(&self) -> TaskType {
            self.task_type
        }

        async fn call(&self, parameters: &Value) -> anyhow::Result<HandlerOutcome> {
            match self.behaviour {
                Behaviour::Succeed => Ok(HandlerOutcome::success("done", Some(parameters.clone()))),
                Behaviour::Error => Err(anyhow::anyhow!("collaborator unreachable")),
                Behaviour::Panic => panic!("handler exploded"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(HandlerOutcome::success("late", None))
                }
            }
        }
    }

    fn dispatcher() -> Dispatcher {
        let behaviour_for = |task_type| match task_type {
            TaskType::Investigation => Behaviour::Error,
            TaskType::Notification => Behaviour::Panic,
            TaskType::Maintenance => Behaviour::Hang,
            _ => Behaviour::Succeed,
        };
        let registry = TaskType::ALL
            .into_iter()
            .fold(HandlerRegistry::builder(), |builder, task_type| {
                builder.register(Arc::new(Scripted {
                    task_type,
                    behaviour: behaviour_for(task_type),
                }))
            })
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(registry), Duration::from_secs(5))
    }

    fn task(task_type: &str) -> Task {
        NewTask::untyped(task_type, "test", json!({"k": 1}))
            .into_task(Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let outcome = dispatcher().dispatch(&task("analysis")).await;
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(json!({"k": 1})));
    }

    #[tokio::test]
    async fn test_unknown_type_fails_without_handler() {
        let outcome = dispatcher().dispatch(&task("bogus")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "unknown task type: bogus");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let outcome = dispatcher().dispatch(&task("investigation")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "collaborator unreachable");
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_failure() {
        let outcome = dispatcher().dispatch(&task("notification")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "handler panicked: handler exploded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_handler_times_out() {
        let outcome = dispatcher().dispatch(&task("maintenance")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "handler timed out after 5s");
    }
}
