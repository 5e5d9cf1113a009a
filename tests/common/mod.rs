//! Shared fixtures for engine integration tests.
//!
//! Every task type is served by [`ScriptedHandler`], whose behaviour is read from the
//! task parameters:
//!
//! - `{"outcome": "succeed" | "fail" | "error" | "panic"}` (default `succeed`)
//! - `{"advance_seconds": n}` moves the shared [`ManualClock`] forward while "running"
//! - `{"disconnect_store": true}` makes the store unreachable before returning

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tasker_queue::config::EngineConfig;
use tasker_queue::database::{InMemoryTaskStore, TaskStore};
use tasker_queue::models::{NewTask, Task, TaskType};
use tasker_queue::orchestration::{BackoffCalculator, BatchRunner, Clock, ManualClock};
use tasker_queue::registry::{HandlerOutcome, HandlerRegistry, TaskHandler};
use uuid::Uuid;

/// One recorded handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub task_type: TaskType,
    pub parameters: Value,
}

#[derive(Debug, Default)]
pub struct InvocationLog {
    calls: Mutex<Vec<Invocation>>,
}

impl InvocationLog {
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

pub struct ScriptedHandler {
    task_type: TaskType,
    store: Arc<InMemoryTaskStore>,
    clock: Arc<ManualClock>,
    log: Arc<InvocationLog>,
}

#[async_trait]
impl TaskHandler for ScriptedHandler {
    fn task_type(&self) -> TaskType {
        self.task_type
    }

    async fn call(&self, parameters: &Value) -> anyhow::Result<HandlerOutcome> {
        self.log.calls.lock().push(Invocation {
            task_type: self.task_type,
            parameters: parameters.clone(),
        });

        if let Some(seconds) = parameters.get("advance_seconds").and_then(Value::as_i64) {
            self.clock.advance(Duration::seconds(seconds));
        }
        if parameters.get("disconnect_store").and_then(Value::as_bool) == Some(true) {
            self.store.set_available(false);
        }

        match parameters.get("outcome").and_then(Value::as_str).unwrap_or("succeed") {
            "succeed" => Ok(HandlerOutcome::success("ok", Some(json!({"echo": parameters})))),
            "fail" => Ok(HandlerOutcome::failure("scripted failure")),
            "error" => Err(anyhow::anyhow!("scripted error")),
            "panic" => panic!("scripted panic"),
            other => Err(anyhow::anyhow!("unknown scripted outcome {other}")),
        }
    }
}

pub struct Harness {
    pub store: Arc<InMemoryTaskStore>,
    pub clock: Arc<ManualClock>,
    pub log: Arc<InvocationLog>,
    pub runner: Arc<BatchRunner>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), BackoffCalculator::default())
    }

    pub fn with_config(config: EngineConfig, backoff: BackoffCalculator) -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let log = Arc::new(InvocationLog::default());

        let registry = TaskType::ALL
            .into_iter()
            .fold(HandlerRegistry::builder(), |builder, task_type| {
                builder.register(Arc::new(ScriptedHandler {
                    task_type,
                    store: store.clone(),
                    clock: clock.clone(),
                    log: log.clone(),
                }))
            })
            .build()
            .expect("scripted registry covers every task type");

        let runner = Arc::new(BatchRunner::new(
            store.clone(),
            Arc::new(registry),
            clock.clone(),
            config,
            backoff,
        ));

        Self {
            store,
            clock,
            log,
            runner,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn enqueue(&self, new_task: NewTask) -> Task {
        self.store
            .enqueue(new_task, self.clock.now())
            .await
            .expect("enqueue into in-memory store")
    }

    pub async fn enqueue_scripted(&self, name: &str, outcome: &str, priority: i32) -> Task {
        self.enqueue(
            NewTask::new(TaskType::Analysis, name, json!({"outcome": outcome}))
                .with_priority(priority),
        )
        .await
    }

    pub async fn reload(&self, id: Uuid) -> Task {
        self.store
            .find(id)
            .await
            .expect("find in in-memory store")
            .expect("task exists")
    }
}

/// Fixed start so failures are reproducible
pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-01T08:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}
