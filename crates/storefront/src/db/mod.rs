//! Database access for the storefront.
//!
//! # Database: `forkful_storefront`
//!
//! The storefront keeps no domain tables. `PostgreSQL` only backs the
//! tower-sessions store, which holds each visitor's cart blob, cart key,
//! remote cart id and any parked outlet conflict.
//!
//! # Migrations
//!
//! The session table is created by the store's own migration:
//! ```bash
//! cargo run -p forkful-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
