use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{KeyValueStore, RemoteProgressRepository, Storage};

mod kv_repo;
mod mapping;
mod migrate;
mod progress_repo;

/// SQLite backend serving both the local key-value store and the
/// `user_progress` table.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or
    /// the connection pragmas fail.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Connect and migrate in one step.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations fail.
    pub async fn open(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }
}

impl Storage {
    /// Build a `Storage` whose local store lives in `local_url` and whose
    /// remote table lives in `remote_url`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if either database cannot be opened or
    /// migrated.
    pub async fn sqlite(local_url: &str, remote_url: &str) -> Result<Self, SqliteInitError> {
        let local_repo = SqliteRepository::open(local_url).await?;
        let remote_repo = if remote_url == local_url {
            local_repo.clone()
        } else {
            SqliteRepository::open(remote_url).await?
        };
        let local: Arc<dyn KeyValueStore> = Arc::new(local_repo);
        let remote: Arc<dyn RemoteProgressRepository> = Arc::new(remote_repo);
        Ok(Self { local, remote })
    }
}
