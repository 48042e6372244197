//! Database Layer
//!
//! `PostgreSQL` pool, migrations, row models and Credential Store / catalog queries.
//! Membership Graph reads live in [`crate::permissions`], writes in [`crate::membership`].

mod models;
mod queries;


use std::time::Duration;

use anyhow::Result;
pub use models::*;
pub(crate) use queries::db_error;
pub use queries::*;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = pool_options().connect(database_url).await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Create a pool that connects on first use.
///
/// Used by tests that exercise request paths which must never reach storage.
pub fn create_lazy_pool(database_url: &str) -> Result<PgPool> {
    Ok(pool_options().min_connections(0).connect_lazy(database_url)?)
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        // Keep minimum connections warm to prevent cold-start latency
        .min_connections(5)
        .max_connections(20)
        // A slow or exhausted pool fails the request instead of hanging it
        .acquire_timeout(Duration::from_secs(5))
        // Clean up idle connections to prevent stale connection issues
        .idle_timeout(Duration::from_secs(600))
        // Validate connections before use to catch stale/broken connections
        .test_before_acquire(true)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Check whether a database error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Check whether a database error is a foreign-key violation.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
