//! Pool setup and error classification.

use sqlx::sqlite::{self, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use tradebus_core::StoreError;

/// Handle to the shared durable store. Cheap to clone; all clones share one
/// connection pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the store at the given path.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
            .map_err(classify)?
            .create_if_missing(true)
            .journal_mode(sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePool::connect_with(options).await.map_err(classify)?;
        init_schema(&pool).await?;
        info!(path, "store opened");
        Ok(Self { pool })
    }

    /// Open an in-memory store, used by tests and dry runs.
    ///
    /// Pinned to a single connection: every pooled connection would
    /// otherwise get its own private in-memory database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(classify)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(classify)?;
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    let schema = include_str!("../sql/schema.sql");
    sqlx::raw_sql(schema).execute(pool).await.map_err(classify)?;
    Ok(())
}

/// Map a driver error into the store taxonomy.
///
/// SQLITE_BUSY (5) and SQLITE_LOCKED (6) mean another writer holds the
/// database; they are expected under concurrent stages and classified as
/// transient `Busy`, distinct from logical conflicts.
pub(crate) fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            let code = code.as_ref();
            if code == "5" || code == "6" || code == "261" || code == "517" {
                return StoreError::Busy;
            }
        }
        if db.message().contains("database is locked")
            || db.message().contains("database table is locked")
        {
            return StoreError::Busy;
        }
    }
    StoreError::Database(e.to_string())
}
