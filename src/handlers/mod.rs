//! # Built-in Task Handlers
//!
//! One handler per [`TaskType`](crate::models::TaskType). Each handler owns a typed
//! view of its parameters and reaches the outside world only through a small port
//! trait, so the engine can be wired against PostgreSQL adapters in production and
//! in-memory doubles in tests.
//!
//! | Task type            | Handler                    | Port                 |
//! |----------------------|----------------------------|----------------------|
//! | `content_generation` | [`ContentGenerationHandler`] | [`ContentGenerator`] |
//! | `knowledge_creation` | [`KnowledgeCreationHandler`] | [`KnowledgeSource`]  |
//! | `investigation`      | [`InvestigationHandler`]   | [`IncidentRepository`] |
//! | `notification`       | [`NotificationHandler`]    | [`Notifier`]         |
//! | `maintenance`        | [`MaintenanceHandler`]     | [`HealthCheckLog`] + task store |
//! | `analysis`           | [`AnalysisHandler`]        | [`AnalyticsSource`]  |

pub mod analysis;
pub mod content_generation;
pub mod investigation;
pub mod knowledge_creation;
pub mod maintenance;
pub mod notification;

pub use analysis::{AnalysisHandler, AnalyticsSource, TaskStoreAnalytics};
pub use content_generation::{ContentGenerationHandler, ContentGenerator};
pub use investigation::{IncidentRepository, InvestigationHandler};
pub use knowledge_creation::{KnowledgeCreationHandler, KnowledgeSource};
pub use maintenance::{HealthCheckLog, MaintenanceHandler};
pub use notification::{NotificationHandler, Notifier};

use crate::database::TaskStore;
use crate::orchestration::Clock;
use crate::registry::HandlerRegistryBuilder;
use std::sync::Arc;

/// Everything the built-in handlers need from outside the engine
#[derive(Clone)]
pub struct HandlerCollaborators {
    pub store: Arc<dyn TaskStore>,
    pub clock: Arc<dyn Clock>,
    pub content: Arc<dyn ContentGenerator>,
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub incidents: Arc<dyn IncidentRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub health_checks: Arc<dyn HealthCheckLog>,
    pub analytics: Arc<dyn AnalyticsSource>,
}

/// Register one handler for every task type
pub fn register_builtin_handlers(
    builder: HandlerRegistryBuilder,
    collaborators: &HandlerCollaborators,
) -> HandlerRegistryBuilder {
    let c = collaborators;
    builder
        .register(Arc::new(ContentGenerationHandler::new(c.content.clone())))
        .register(Arc::new(KnowledgeCreationHandler::new(
            c.knowledge.clone(),
            c.clock.clone(),
        )))
        .register(Arc::new(InvestigationHandler::new(
            c.incidents.clone(),
            c.clock.clone(),
        )))
        .register(Arc::new(NotificationHandler::new(c.notifier.clone())))
        .register(Arc::new(MaintenanceHandler::new(
            c.store.clone(),
            c.health_checks.clone(),
            c.clock.clone(),
        )))
        .register(Arc::new(AnalysisHandler::new(
            c.analytics.clone(),
            c.clock.clone(),
        )))
}
