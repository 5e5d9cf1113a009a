use crate::config::DatabaseConfig;
use crate::error::{Result, TaskerError};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, error};

/// Build the connection pool owned by the process entry point
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let database_url = config.database_url()?;

    debug!(
        max_connections = config.max_connections,
        acquire_timeout_seconds = config.acquire_timeout_seconds,
        "Connecting to task store database"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to task store database: {}", e);
            TaskerError::DatabaseError(format!("Connection failed: {e}"))
        })
}

/// Round-trip a trivial query to verify the pool is usable
pub async fn ping(pool: &PgPool) -> Result<()> {
    let (health,): (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| TaskerError::DatabaseError(format!("Health check failed: {e}")))?;

    if health == 1 {
        Ok(())
    } else {
        Err(TaskerError::DatabaseError(format!(
            "Health check returned unexpected value {health}"
        )))
    }
}
