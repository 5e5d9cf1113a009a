//! # Investigation Handler
//!
//! Correlates an incident with historical incidents sharing its error signature and
//! attaches the resulting [`IncidentAnalysis`]. The analysis replaces any previous one,
//! so running the same investigation twice leaves exactly one analysis on the incident.

use crate::models::TaskType;
use crate::orchestration::Clock;
use crate::registry::{parse_parameters, HandlerOutcome, TaskHandler};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Historical incidents considered per investigation
pub const SIMILAR_INCIDENT_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvestigationParams {
    pub incident_id: Uuid,
    /// Overrides the signature recorded on the incident
    #[serde(default)]
    pub error_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub error_signature: Option<String>,
    pub resolved: bool,
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentAnalysis {
    pub incident_id: Uuid,
    pub error_signature: Option<String>,
    pub similar_incident_ids: Vec<Uuid>,
    pub resolved_similar: usize,
    /// Resolution of the first resolved similar incident, if any
    pub suggested_resolution: Option<String>,
    /// Share of similar incidents that were resolved (0.0 when there are none)
    pub confidence: f64,
    pub analyzed_at: DateTime<Utc>,
}

#[async_trait]
pub trait IncidentRepository: Send + Sync {
    async fn find_incident(&self, id: Uuid) -> Result<Option<Incident>>;

    /// Other incidents with the same signature, most recent first
    async fn similar_incidents(
        &self,
        error_signature: &str,
        exclude: Uuid,
        limit: u32,
    ) -> Result<Vec<Incident>>;

    /// Attach `analysis` to its incident, replacing any earlier analysis
    async fn save_analysis(&self, analysis: &IncidentAnalysis) -> Result<()>;
}

pub struct InvestigationHandler {
    incidents: Arc<dyn IncidentRepository>,
    clock: Arc<dyn Clock>,
}

impl InvestigationHandler {
    pub fn new(incidents: Arc<dyn IncidentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { incidents, clock }
    }

    fn analyze(
        &self,
        incident: &Incident,
        error_signature: Option<String>,
        similar: &[Incident],
    ) -> IncidentAnalysis {
        let resolved: Vec<&Incident> = similar.iter().filter(|i| i.resolved).collect();
        let confidence = if similar.is_empty() {
            0.0
        } else {
            resolved.len() as f64 / similar.len() as f64
        };
        IncidentAnalysis {
            incident_id: incident.id,
            error_signature,
            similar_incident_ids: similar.iter().map(|i| i.id).collect(),
            resolved_similar: resolved.len(),
            suggested_resolution: resolved.iter().find_map(|i| i.resolution.clone()),
            confidence,
            analyzed_at: self.clock.now(),
        }
    }
}

#[async_trait]
impl TaskHandler for InvestigationHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Investigation
    }

    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome> {
        let params: InvestigationParams = parse_parameters(self.task_type(), parameters)?;

        let Some(incident) = self.incidents.find_incident(params.incident_id).await? else {
            return Ok(HandlerOutcome::failure(format!(
                "incident {} not found",
                params.incident_id
            )));
        };

        let error_signature = params
            .error_signature
            .or_else(|| incident.error_signature.clone())
            .filter(|signature| !signature.trim().is_empty());

        let similar = match &error_signature {
            Some(signature) => {
                self.incidents
                    .similar_incidents(signature, incident.id, SIMILAR_INCIDENT_LIMIT)
                    .await?
            }
            None => Vec::new(),
        };

        let analysis = self.analyze(&incident, error_signature, &similar);
        self.incidents.save_analysis(&analysis).await?;

        info!(
            incident_id = %incident.id,
            similar = analysis.similar_incident_ids.len(),
            confidence = analysis.confidence,
            "Incident analysis saved"
        );

        let message = if analysis.error_signature.is_none() {
            format!("incident {} has no error signature to correlate", incident.id)
        } else {
            format!(
                "found {} similar incidents for {} ({} resolved)",
                analysis.similar_incident_ids.len(),
                incident.id,
                analysis.resolved_similar
            )
        };
        Ok(HandlerOutcome::success(
            message,
            Some(serde_json::to_value(&analysis)?),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::ManualClock;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeIncidents {
        incidents: Vec<Incident>,
        analyses: Mutex<HashMap<Uuid, IncidentAnalysis>>,
    }

    #[async_trait]
    impl IncidentRepository for FakeIncidents {
        async fn find_incident(&self, id: Uuid) -> Result<Option<Incident>> {
            Ok(self.incidents.iter().find(|i| i.id == id).cloned())
        }

        async fn similar_incidents(
            &self,
            error_signature: &str,
            exclude: Uuid,
            limit: u32,
        ) -> Result<Vec<Incident>> {
            Ok(self
                .incidents
                .iter()
                .filter(|i| i.id != exclude)
                .filter(|i| i.error_signature.as_deref() == Some(error_signature))
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn save_analysis(&self, analysis: &IncidentAnalysis) -> Result<()> {
            self.analyses
                .lock()
                .insert(analysis.incident_id, analysis.clone());
            Ok(())
        }
    }

    fn incident(signature: &str, resolution: Option<&str>) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            title: format!("{signature} incident"),
            error_signature: Some(signature.to_string()),
            resolved: resolution.is_some(),
            resolution: resolution.map(str::to_string),
        }
    }

    fn setup() -> (Arc<FakeIncidents>, Uuid) {
        let current = incident("E_POOL", None);
        let id = current.id;
        let repo = Arc::new(FakeIncidents {
            incidents: vec![
                current,
                incident("E_POOL", Some("increase max_connections")),
                incident("E_POOL", None),
                incident("E_DISK", Some("rotate logs")),
            ],
            ..FakeIncidents::default()
        });
        (repo, id)
    }

    #[tokio::test]
    async fn test_correlates_similar_incidents() {
        let (repo, id) = setup();
        let handler = InvestigationHandler::new(repo.clone(), Arc::new(ManualClock::default()));
        let outcome = handler.call(&json!({"incident_id": id})).await.unwrap();

        assert!(outcome.success);
        let analyses = repo.analyses.lock();
        let analysis = &analyses[&id];
        assert_eq!(analysis.similar_incident_ids.len(), 2);
        assert_eq!(analysis.resolved_similar, 1);
        assert_eq!(
            analysis.suggested_resolution.as_deref(),
            Some("increase max_connections")
        );
        assert!((analysis.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_rerun_replaces_analysis() {
        let (repo, id) = setup();
        let clock = Arc::new(ManualClock::default());
        let handler = InvestigationHandler::new(repo.clone(), clock.clone());
        handler.call(&json!({"incident_id": id})).await.unwrap();
        clock.advance(chrono::Duration::minutes(5));
        handler.call(&json!({"incident_id": id})).await.unwrap();

        let analyses = repo.analyses.lock();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[&id].analyzed_at, clock.now());
    }

    #[tokio::test]
    async fn test_signature_override_is_used() {
        let (repo, id) = setup();
        let handler = InvestigationHandler::new(repo.clone(), Arc::new(ManualClock::default()));
        handler
            .call(&json!({"incident_id": id, "error_signature": "E_DISK"}))
            .await
            .unwrap();
        let analyses = repo.analyses.lock();
        assert_eq!(analyses[&id].similar_incident_ids.len(), 1);
        assert_eq!(analyses[&id].error_signature.as_deref(), Some("E_DISK"));
    }

    #[tokio::test]
    async fn test_unknown_incident_fails() {
        let (repo, _) = setup();
        let handler = InvestigationHandler::new(repo.clone(), Arc::new(ManualClock::default()));
        let missing = Uuid::new_v4();
        let outcome = handler.call(&json!({"incident_id": missing})).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, format!("incident {missing} not found"));
        assert!(repo.analyses.lock().is_empty());
    }
}
