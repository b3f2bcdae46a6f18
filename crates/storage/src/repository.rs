use async_trait::async_trait;
use lingua_core::model::{RemoteProgressRecord, TenseId, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by local storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes requested, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<lingua_core::Error> for RemoteError {
    fn from(err: lingua_core::Error) -> Self {
        RemoteError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the remote progress table.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("remote request timed out")]
    Timeout,

    #[error("not authorized for remote progress")]
    Unauthorized,

    #[error("remote backend responded with status {status}")]
    Backend { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Device-local string store, the equivalent of a browser's `localStorage`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be read.
    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium rejects the write (for example
    /// when a quota is exceeded).
    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Per-user progress table living on the remote backend.
#[async_trait]
pub trait RemoteProgressRepository: Send + Sync {
    /// Fetch every progress row belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on network, auth or backend failures.
    async fn fetch_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRecord>, RemoteError>;

    /// Insert or replace rows keyed by `(user_id, tense_id)`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on network, auth or backend failures.
    async fn upsert_many(&self, records: &[RemoteProgressRecord]) -> Result<(), RemoteError>;
}

/// Simple in-memory key-value store for tests and ephemeral sessions.
///
/// An optional byte quota mimics the size limit of browser storage.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects values longer than `bytes`.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(bytes),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota {
            if value.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    limit,
                });
            }
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// In-memory stand-in for the remote progress table.
#[derive(Clone, Default)]
pub struct InMemoryRemoteRepository {
    rows: Arc<Mutex<BTreeMap<(UserId, TenseId), RemoteProgressRecord>>>,
}

impl InMemoryRemoteRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored across all users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().map(|g| g.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RemoteProgressRepository for InMemoryRemoteRepository {
    async fn fetch_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRecord>, RemoteError> {
        let guard = self
            .rows
            .lock()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_many(&self, records: &[RemoteProgressRecord]) -> Result<(), RemoteError> {
        let mut guard = self
            .rows
            .lock()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        for record in records {
            guard.insert(
                (record.user_id.clone(), record.tense_id.clone()),
                record.clone(),
            );
        }
        Ok(())
    }
}

/// Aggregates the local store and the remote table behind trait objects for
/// easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub local: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let local: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let remote: Arc<dyn RemoteProgressRepository> = Arc::new(InMemoryRemoteRepository::new());
        Self { local, remote }
    }
}
