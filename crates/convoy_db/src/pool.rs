//! Database pool creation.
//!
//! Compile-time database selection via feature flags, with concrete pool
//! types rather than `sqlx::AnyPool` so chrono and friends decode without
//! ceremony.
//!
//! - `sqlite` feature (default): embedded store, used by every test
//! - `postgres` feature: the deployment target

use crate::error::Result;

/// Selected database driver.
#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Db = sqlx::Postgres;

/// Connection pool over the selected driver.
pub type DbPool = sqlx::Pool<Db>;

/// Row type for queries.
pub type DbRow = <Db as sqlx::Database>::Row;

/// An open transaction; rolls back on drop unless committed.
pub type DbTx = sqlx::Transaction<'static, Db>;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
        }
    }

    /// In-memory SQLite configuration (for testing).
    #[cfg(feature = "sqlite")]
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            // A single connection: every handle must see the same
            // in-memory database.
            max_connections: 1,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool> {
    let pool = sqlx::pool::PoolOptions::<Db>::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}
