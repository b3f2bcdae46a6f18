use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use storage::repository::RemoteError;
use tokio::sync::{Mutex, MutexGuard};

/// Serializes every read-modify-write of the local snapshot.
///
/// The sync and the progress services share one gate so a sync and an update
/// (or two syncs) never interleave between reading the snapshot and pushing
/// the result.
#[derive(Clone, Default)]
pub struct SyncGate {
    inner: Arc<Mutex<()>>,
}

impl SyncGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn enter(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }
}

/// Runs a remote call, mapping an elapsed `limit` to `RemoteError::Timeout`.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout))
}
