//! Database access layer (PostgreSQL)

pub mod orders;
pub mod outbox;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool};

use crate::config::DatabaseConfig;

pub use orders::{OrderStore, PersistedOrder, PgOrderStore};
pub use outbox::{OutboxEntry, OutboxStore, PgOutboxStore};

/// Open the pool and confirm the server answers.
///
/// One call is one connection attempt; retrying is the caller's job.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(config.connect_options()?)
        .await?;

    // connect_with already opened one connection; ping it so a server that
    // accepts TCP but cannot serve queries counts as a failed attempt
    let mut conn = pool.acquire().await?;
    conn.ping().await?;

    Ok(pool)
}

/// Bring the schema up to date. Safe to run on every start.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
