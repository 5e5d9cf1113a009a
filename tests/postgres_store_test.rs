//! PostgreSQL task store tests.
//!
//! Need a running PostgreSQL and `DATABASE_URL`; run with `cargo test -- --ignored`.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashSet;
use tasker_queue::database::collaborators::PgIncidents;
use tasker_queue::database::{PgTaskStore, TaskPurgeFilter, TaskStore};
use tasker_queue::handlers::investigation::IncidentAnalysis;
use tasker_queue::handlers::IncidentRepository;
use tasker_queue::models::{NewTask, TaskResolution, TaskType};
use tasker_queue::state_machine::TaskStatus;
use uuid::Uuid;

fn new_task(name: &str, priority: i32) -> NewTask {
    NewTask::new(TaskType::Analysis, name, json!({"window_hours": 1})).with_priority(priority)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_claim_orders_and_marks_processing(pool: PgPool) {
    let store = PgTaskStore::new(pool);
    let now = Utc::now();
    let low = store.enqueue(new_task("low", 9), now).await.unwrap();
    let high = store.enqueue(new_task("high", 1), now).await.unwrap();
    store
        .enqueue(new_task("later", 1).scheduled_for(now + Duration::hours(1)), now)
        .await
        .unwrap();

    let claimed = store.claim_batch(10, now).await.unwrap();
    let ids: Vec<_> = claimed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![high.id, low.id]);
    assert!(claimed
        .iter()
        .all(|t| t.status == TaskStatus::Processing && t.attempts == 1 && t.started_at.is_some()));

    assert!(store.claim_batch(10, now).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_claims_are_exclusive(pool: PgPool) {
    let store = std::sync::Arc::new(PgTaskStore::new(pool));
    let now = Utc::now();
    for i in 0..20 {
        store.enqueue(new_task(&format!("t{i}"), i % 3), now).await.unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim_batch(5, now).await.unwrap() })
        })
        .collect();
    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap().into_iter().map(|t| t.id));
    }

    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), 20);
    assert_eq!(unique.len(), 20);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_resolve_is_conditional_on_claim(pool: PgPool) {
    let store = PgTaskStore::new(pool);
    let now = Utc::now();
    store.enqueue(new_task("retry-me", 1), now).await.unwrap();
    let claimed = store.claim_batch(1, now).await.unwrap().remove(0);

    let retry_at = now + Duration::minutes(5);
    let requeue = TaskResolution::Requeued {
        completed_at: now,
        scheduled_for: retry_at,
        error_message: "upstream timeout".to_string(),
        result: Some(json!({"upstream": "billing", "status": 504})),
    };
    assert!(store.resolve(&claimed, &requeue).await.unwrap());
    assert!(!store.resolve(&claimed, &requeue).await.unwrap());

    let stored = store.find(claimed.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Queued);
    assert_eq!(stored.error_message.as_deref(), Some("upstream timeout"));
    assert_eq!(stored.result, Some(json!({"upstream": "billing", "status": 504})));
    assert_eq!(stored.scheduled_for.timestamp(), retry_at.timestamp());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_reclaim_stale_requeues_or_fails(pool: PgPool) {
    let store = PgTaskStore::new(pool);
    let started = Utc::now() - Duration::hours(1);
    store.enqueue(new_task("retryable", 1), started).await.unwrap();
    store
        .enqueue(new_task("exhausted", 2).with_max_attempts(1), started)
        .await
        .unwrap();
    store.claim_batch(10, started).await.unwrap();

    let now = Utc::now();
    let reclaim = store
        .reclaim_stale(now - Duration::minutes(15), now, "reclaimed")
        .await
        .unwrap();
    assert_eq!(reclaim.requeued, 1);
    assert_eq!(reclaim.failed, 1);
    assert_eq!(store.claim_batch(10, now).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_and_purge(pool: PgPool) {
    let store = PgTaskStore::new(pool);
    let now = Utc::now();
    let task = store.enqueue(new_task("cancel-me", 1), now).await.unwrap();

    assert!(store.cancel(task.id, now).await.unwrap());
    assert!(!store.cancel(task.id, now).await.unwrap());

    let kept = store
        .delete_matching(&TaskPurgeFilter {
            statuses: vec![TaskStatus::Cancelled],
            completed_before: now - Duration::days(1),
        })
        .await
        .unwrap();
    assert_eq!(kept, 0);

    let deleted = store
        .delete_matching(&TaskPurgeFilter {
            statuses: vec![TaskStatus::Cancelled, TaskStatus::Completed],
            completed_before: now + Duration::seconds(1),
        })
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(store.find(task.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_activity_counts_group_by_type_and_status(pool: PgPool) {
    let store = PgTaskStore::new(pool);
    let now = Utc::now();
    store.enqueue(new_task("a", 1), now).await.unwrap();
    store.enqueue(new_task("b", 1), now).await.unwrap();

    let counts = store.activity_since(now - Duration::hours(1)).await.unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].task_type, "analysis");
    assert_eq!(counts[0].status, TaskStatus::Queued);
    assert_eq!(counts[0].count, 2);
}

fn analysis_for(incident_id: Uuid) -> IncidentAnalysis {
    IncidentAnalysis {
        incident_id,
        error_signature: Some("ETIMEDOUT".to_string()),
        similar_incident_ids: Vec::new(),
        resolved_similar: 0,
        suggested_resolution: None,
        confidence: 0.0,
        analyzed_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_analysis_requires_existing_incident(pool: PgPool) {
    let incident_id = Uuid::new_v4();
    sqlx::query("INSERT INTO tasker_incidents (id, title, error_signature) VALUES ($1, $2, $3)")
        .bind(incident_id)
        .bind("timeouts")
        .bind("ETIMEDOUT")
        .execute(&pool)
        .await
        .unwrap();
    let incidents = PgIncidents::new(pool);

    incidents.save_analysis(&analysis_for(incident_id)).await.unwrap();
    let stored = incidents.find_incident(incident_id).await.unwrap();
    assert!(stored.is_some());

    let missing = incidents.save_analysis(&analysis_for(Uuid::new_v4())).await;
    assert!(missing
        .unwrap_err()
        .to_string()
        .contains("no longer exists"));
}
