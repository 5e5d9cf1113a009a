//! # Content Generation Handler
//!
//! Creates `count` draft content items of one type through a [`ContentGenerator`].
//! Generation itself (prompting, templates) belongs to the generator; this handler only
//! validates the request, fans it out and reports how many drafts were created.

use crate::models::TaskType;
use crate::registry::{parse_parameters, HandlerOutcome, TaskHandler};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const MAX_DRAFTS_PER_TASK: u32 = 50;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentGenerationParams {
    pub content_type: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub topic: Option<String>,
}

fn default_count() -> u32 {
    1
}

/// One draft to create; `sequence` is 1-based within the task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRequest {
    pub content_type: String,
    pub topic: Option<String>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub id: Uuid,
    pub title: String,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn create_draft(&self, request: &DraftRequest) -> Result<ContentDraft>;
}

pub struct ContentGenerationHandler {
    generator: Arc<dyn ContentGenerator>,
}

impl ContentGenerationHandler {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TaskHandler for ContentGenerationHandler {
    fn task_type(&self) -> TaskType {
        TaskType::ContentGeneration
    }

    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome> {
        let params: ContentGenerationParams = parse_parameters(self.task_type(), parameters)?;
        if params.content_type.trim().is_empty() {
            bail!("content_type must not be empty");
        }
        if !(1..=MAX_DRAFTS_PER_TASK).contains(&params.count) {
            bail!(
                "count must be between 1 and {MAX_DRAFTS_PER_TASK}, got {}",
                params.count
            );
        }

        let mut draft_ids = Vec::new();
        let mut errors = Vec::new();
        for sequence in 1..=params.count {
            let request = DraftRequest {
                content_type: params.content_type.clone(),
                topic: params.topic.clone(),
                sequence,
            };
            match self.generator.create_draft(&request).await {
                Ok(draft) => {
                    debug!(draft_id = %draft.id, sequence, "Draft created");
                    draft_ids.push(draft.id);
                }
                Err(e) => {
                    warn!(sequence, error = %e, "Draft creation failed");
                    errors.push(format!("draft {sequence}: {e}"));
                }
            }
        }

        let created = draft_ids.len();
        let data = json!({
            "content_type": params.content_type,
            "requested": params.count,
            "created": created,
            "draft_ids": draft_ids,
            "errors": errors,
        });

        if created == 0 {
            return Ok(HandlerOutcome::failure_with_data(
                format!(
                    "generated 0 of {} {} drafts: {}",
                    params.count,
                    params.content_type,
                    errors.join("; ")
                ),
                data,
            ));
        }
        Ok(HandlerOutcome::success(
            format!(
                "generated {created} of {} {} drafts",
                params.count, params.content_type
            ),
            Some(data),
        ))
    }
}
