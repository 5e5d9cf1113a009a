//! # Knowledge Creation Handler
//!
//! Turns resolved incidents into draft knowledge-base articles. Either an explicit
//! list of source records or every record resolved within the lookback window is used.
//! Article creation is idempotent per source record, so re-running a task (or two
//! overlapping tasks) never duplicates an article.

use crate::models::TaskType;
use crate::orchestration::Clock;
use crate::registry::{parse_parameters, HandlerOutcome, TaskHandler};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const MAX_LOOKBACK_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeCreationParams {
    #[serde(default)]
    pub source_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub lookback_days: Option<u32>,
}

/// Which resolved records to turn into articles
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    /// Explicit records; when present the window is ignored
    pub source_ids: Option<Vec<Uuid>>,
    pub resolved_since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: Uuid,
    pub title: String,
    pub error_signature: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleDraft {
    Created(Uuid),
    /// An article for this source record already exists
    AlreadyExists,
}

#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn resolved_records(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>>;

    async fn create_article_draft(&self, record: &SourceRecord) -> Result<ArticleDraft>;
}

pub struct KnowledgeCreationHandler {
    source: Arc<dyn KnowledgeSource>,
    clock: Arc<dyn Clock>,
}

impl KnowledgeCreationHandler {
    pub fn new(source: Arc<dyn KnowledgeSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }
}

#[async_trait]
impl TaskHandler for KnowledgeCreationHandler {
    fn task_type(&self) -> TaskType {
        TaskType::KnowledgeCreation
    }

    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome> {
        let params: KnowledgeCreationParams = parse_parameters(self.task_type(), parameters)?;
        let lookback_days = params.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        if lookback_days == 0 || lookback_days > MAX_LOOKBACK_DAYS {
            bail!("lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {lookback_days}");
        }

        let query = SourceQuery {
            source_ids: params.source_ids,
            resolved_since: self.clock.now() - Duration::days(i64::from(lookback_days)),
        };
        let records = self.source.resolved_records(&query).await?;
        if records.is_empty() {
            return Ok(HandlerOutcome::success(
                "no resolved records to turn into articles",
                Some(json!({"sources": 0, "created": 0, "existing": 0})),
            ));
        }

        let mut article_ids = Vec::new();
        let mut existing = 0usize;
        let mut errors = Vec::new();
        for record in &records {
            match self.source.create_article_draft(record).await {
                Ok(ArticleDraft::Created(id)) => {
                    debug!(source_id = %record.id, article_id = %id, "Article draft created");
                    article_ids.push(id);
                }
                Ok(ArticleDraft::AlreadyExists) => existing += 1,
                Err(e) => {
                    warn!(source_id = %record.id, error = %e, "Article draft failed");
                    errors.push(format!("{}: {e}", record.id));
                }
            }
        }

        let data = json!({
            "sources": records.len(),
            "created": article_ids.len(),
            "existing": existing,
            "article_ids": article_ids,
            "errors": errors,
        });

        if errors.len() == records.len() {
            return Ok(HandlerOutcome::failure_with_data(
                format!("no article drafts could be created: {}", errors.join("; ")),
                data,
            ));
        }
        Ok(HandlerOutcome::success(
            format!(
                "created {} knowledge article drafts from {} resolved records ({existing} already existed)",
                article_ids.len(),
                records.len()
            ),
            Some(data),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::ManualClock;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeSource {
        records: Vec<SourceRecord>,
        articles: Mutex<HashSet<Uuid>>,
        queries: Mutex<Vec<SourceQuery>>,
        broken: bool,
    }

    #[async_trait]
    impl KnowledgeSource for FakeSource {
        async fn resolved_records(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
            self.queries.lock().push(query.clone());
            Ok(match &query.source_ids {
                Some(ids) => self
                    .records
                    .iter()
                    .filter(|r| ids.contains(&r.id))
                    .cloned()
                    .collect(),
                None => self.records.clone(),
            })
        }

        async fn create_article_draft(&self, record: &SourceRecord) -> Result<ArticleDraft> {
            if self.broken {
                bail!("knowledge base read-only");
            }
            if self.articles.lock().insert(record.id) {
                Ok(ArticleDraft::Created(Uuid::new_v4()))
            } else {
                Ok(ArticleDraft::AlreadyExists)
            }
        }
    }

    fn record(title: &str) -> SourceRecord {
        SourceRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            error_signature: Some("E_TIMEOUT".to_string()),
            resolution: Some("raised pool size".to_string()),
        }
    }

    fn handler(source: Arc<FakeSource>, clock: Arc<ManualClock>) -> KnowledgeCreationHandler {
        KnowledgeCreationHandler::new(source, clock)
    }

    #[tokio::test]
    async fn test_creation_is_idempotent_per_source() {
        let source = Arc::new(FakeSource {
            records: vec![record("db timeout"), record("queue backlog")],
            ..FakeSource::default()
        });
        let handler = handler(source.clone(), Arc::new(ManualClock::default()));

        let first = handler.call(&json!({})).await.unwrap();
        assert!(first.success);
        assert_eq!(first.data.unwrap()["created"], 2);

        let second = handler.call(&json!({})).await.unwrap();
        assert!(second.success);
        let data = second.data.unwrap();
        assert_eq!(data["created"], 0);
        assert_eq!(data["existing"], 2);
        assert_eq!(source.articles.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_lookback_window_uses_clock() {
        let source = Arc::new(FakeSource::default());
        let clock = Arc::new(ManualClock::default());
        let outcome = handler(source.clone(), clock.clone())
            .call(&json!({"lookback_days": 3}))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["created"], 0);
        assert_eq!(
            source.queries.lock()[0].resolved_since,
            clock.now() - Duration::days(3)
        );
    }

    #[tokio::test]
    async fn test_explicit_source_ids_are_passed_through() {
        let wanted = record("wanted");
        let source = Arc::new(FakeSource {
            records: vec![wanted.clone(), record("other")],
            ..FakeSource::default()
        });
        let outcome = handler(source, Arc::new(ManualClock::default()))
            .call(&json!({"source_ids": [wanted.id]}))
            .await
            .unwrap();
        assert_eq!(outcome.data.unwrap()["sources"], 1);
    }

    #[tokio::test]
    async fn test_all_creations_failing_is_a_failure() {
        let source = Arc::new(FakeSource {
            records: vec![record("db timeout")],
            broken: true,
            ..FakeSource::default()
        });
        let outcome = handler(source, Arc::new(ManualClock::default()))
            .call(&json!({}))
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_invalid_lookback_is_rejected() {
        let outcome = handler(Arc::new(FakeSource::default()), Arc::new(ManualClock::default()))
            .call(&json!({"lookback_days": 0}))
            .await;
        assert!(outcome.is_err());
    }
}
