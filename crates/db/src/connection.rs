use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use linehaul_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Session pragmas applied to every pooled connection. WAL with relaxed
/// fsync lets backfill writes proceed without blocking API reads on the
/// same file.
const SESSION_PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA busy_timeout = 5000",
];

pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(database.timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                for pragma in SESSION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(&database.url)
        .await
}

/// Single-connection in-memory pool for tests. A second connection would
/// open its own empty database, so the pool is pinned to one handle.
pub async fn connect_ephemeral() -> Result<DbPool, sqlx::Error> {
    connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 30,
    })
    .await
}
