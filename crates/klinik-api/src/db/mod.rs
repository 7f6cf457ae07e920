//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, users and
//! appointments live in PostgreSQL. When absent, the API runs on the
//! in-memory store (suitable for development and testing); nothing survives
//! a restart.

pub mod appointments;
pub mod users;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppConfig;
use crate::store::StoreError;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no database URL is configured (in-memory mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(config: &AppConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match config.database_url.as_deref() {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set, running on the in-memory store. \
                 Accounts and appointments will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = connect(url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    Ok(Some(pool))
}

/// Open a pool without running migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Map a driver error, turning unique-constraint violations into
/// [`StoreError::Duplicate`] for `what`.
pub(crate) fn map_write_error(err: sqlx::Error, what: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::MissingReference("patient")
        }
        _ => StoreError::Database(err),
    }
}
