//! # PostgreSQL Handler Adapters
//!
//! Implementations of the built-in handlers' port traits against the tables created in
//! `migrations/`. They share the task store's pool.
//!
//! Content generation here only records placeholder drafts; producing the content
//! itself is left to whatever consumes `tasker_content_drafts`.

use crate::handlers::content_generation::{ContentDraft, ContentGenerator, DraftRequest};
use crate::handlers::investigation::{Incident, IncidentAnalysis, IncidentRepository};
use crate::handlers::knowledge_creation::{
    ArticleDraft, KnowledgeSource, SourceQuery, SourceRecord,
};
use crate::handlers::maintenance::HealthCheckLog;
use crate::handlers::notification::{Notification, Notifier};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgContentDrafts {
    pool: PgPool,
}

impl PgContentDrafts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentGenerator for PgContentDrafts {
    async fn create_draft(&self, request: &DraftRequest) -> Result<ContentDraft> {
        let id = Uuid::new_v4();
        let title = match &request.topic {
            Some(topic) => format!("{}: {topic} (draft {})", request.content_type, request.sequence),
            None => format!("{} draft {}", request.content_type, request.sequence),
        };

        sqlx::query(
            "INSERT INTO tasker_content_drafts (id, content_type, topic, title) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&request.content_type)
        .bind(&request.topic)
        .bind(&title)
        .execute(&self.pool)
        .await
        .context("failed to insert content draft")?;

        Ok(ContentDraft { id, title })
    }
}

#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: Uuid,
    title: String,
    error_signature: Option<String>,
    status: String,
    resolution: Option<String>,
}

impl From<IncidentRow> for Incident {
    fn from(row: IncidentRow) -> Self {
        Incident {
            id: row.id,
            title: row.title,
            error_signature: row.error_signature,
            resolved: row.status == "resolved",
            resolution: row.resolution,
        }
    }
}

/// Incidents table: source of knowledge articles and subject of investigations
#[derive(Debug, Clone)]
pub struct PgIncidents {
    pool: PgPool,
}

impl PgIncidents {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeSource for PgIncidents {
    async fn resolved_records(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
        let rows: Vec<IncidentRow> = match &query.source_ids {
            Some(ids) => sqlx::query_as(
                r#"
                SELECT id, title, error_signature, status, resolution
                FROM tasker_incidents
                WHERE status = 'resolved' AND id = ANY($1)
                ORDER BY resolved_at
                "#,
            )
            .bind(ids)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(
                r#"
                SELECT id, title, error_signature, status, resolution
                FROM tasker_incidents
                WHERE status = 'resolved' AND resolved_at >= $1
                ORDER BY resolved_at
                "#,
            )
            .bind(query.resolved_since)
            .fetch_all(&self.pool)
            .await,
        }
        .context("failed to load resolved incidents")?;

        Ok(rows
            .into_iter()
            .map(|row| SourceRecord {
                id: row.id,
                title: row.title,
                error_signature: row.error_signature,
                resolution: row.resolution,
            })
            .collect())
    }

    async fn create_article_draft(&self, record: &SourceRecord) -> Result<ArticleDraft> {
        let body = format!(
            "Symptom: {}\n\nResolution: {}",
            record.error_signature.as_deref().unwrap_or("unspecified"),
            record.resolution.as_deref().unwrap_or("not recorded"),
        );
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO tasker_knowledge_articles (id, source_id, title, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.id)
        .bind(&record.title)
        .bind(body)
        .fetch_optional(&self.pool)
        .await
        .context("failed to insert knowledge article")?;

        Ok(match inserted {
            Some((id,)) => ArticleDraft::Created(id),
            None => ArticleDraft::AlreadyExists,
        })
    }
}

#[async_trait]
impl IncidentRepository for PgIncidents {
    async fn find_incident(&self, id: Uuid) -> Result<Option<Incident>> {
        let row: Option<IncidentRow> = sqlx::query_as(
            "SELECT id, title, error_signature, status, resolution FROM tasker_incidents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load incident")?;
        Ok(row.map(Incident::from))
    }

    async fn similar_incidents(
        &self,
        error_signature: &str,
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<Incident>> {
        let rows: Vec<IncidentRow> = sqlx::query_as(
            r#"
            SELECT id, title, error_signature, status, resolution
            FROM tasker_incidents
            WHERE error_signature = $1 AND id <> $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(error_signature)
        .bind(exclude)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to load similar incidents")?;
        Ok(rows.into_iter().map(Incident::from).collect())
    }

    async fn save_analysis(&self, analysis: &IncidentAnalysis) -> Result<()> {
        let document = serde_json::to_value(analysis)?;
        let outcome = sqlx::query(
            "UPDATE tasker_incidents SET analysis = $2, analyzed_at = $3 WHERE id = $1",
        )
        .bind(analysis.incident_id)
        .bind(document)
        .bind(analysis.analyzed_at)
        .execute(&self.pool)
        .await
        .context("failed to save incident analysis")?;
        if outcome.rows_affected() == 0 {
            bail!(
                "incident {} no longer exists; analysis not saved",
                analysis.incident_id
            );
        }
        Ok(())
    }
}

/// Notifier that writes to an outbox table drained by a delivery service
#[derive(Debug, Clone)]
pub struct PgNotificationOutbox {
    pool: PgPool,
}

impl PgNotificationOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotificationOutbox {
    async fn send(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasker_notification_outbox (id, recipient, channel, subject, body)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&notification.recipient)
        .bind(&notification.channel)
        .bind(&notification.subject)
        .bind(&notification.body)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to queue notification for {}", notification.recipient))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgHealthCheckLog {
    pool: PgPool,
}

impl PgHealthCheckLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheckLog for PgHealthCheckLog {
    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let outcome = sqlx::query("DELETE FROM tasker_health_checks WHERE checked_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .context("failed to purge health checks")?;
        Ok(outcome.rows_affected())
    }
}
