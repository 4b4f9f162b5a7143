//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! forkful-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `FORKFUL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! The storefront has no tables of its own; this creates the schema and
//! table `tower-sessions-sqlx-store` keeps sessions (and so carts) in.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn database_url() -> Result<SecretString, MigrationError> {
    std::env::var("FORKFUL_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("FORKFUL_DATABASE_URL"))
}

/// Run the session-store migration.
///
/// # Errors
///
/// Returns `MigrationError` if the database URL is missing or the migration fails.
pub async fn sessions() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();

    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Session store migration complete!");
    Ok(())
}
