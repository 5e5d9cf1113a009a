//! # Database Migrations
//!
//! Schema for the task store and the built-in handler adapters lives in `migrations/`
//! as timestamped SQL files (`YYYYMMDDHHMMSS_description.sql`), embedded at compile time.

use crate::error::Result;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply every outstanding migration; safe to run repeatedly
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "Database migrations applied"
    );
    Ok(())
}
