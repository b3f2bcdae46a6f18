use std::sync::Arc;

use lingua_core::model::{Percent, ProgressSummary, TenseId, TenseProgress, TenseStatus, UserId};
use storage::ProgressStore;
use storage::repository::RemoteProgressRepository;
use tracing::{debug, warn};

use crate::Clock;
use crate::config::SyncConfig;
use crate::error::ProgressError;
use crate::gate::{SyncGate, bounded};

/// Applies single-tense progress updates locally and pushes them best-effort.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: ProgressStore,
    remote: Arc<dyn RemoteProgressRepository>,
    gate: SyncGate,
    config: SyncConfig,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: ProgressStore,
        remote: Arc<dyn RemoteProgressRepository>,
        gate: SyncGate,
        config: SyncConfig,
    ) -> Self {
        Self {
            clock,
            store,
            remote,
            gate,
            config,
        }
    }

    /// Current local snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the local store cannot be read.
    pub async fn snapshot(&self) -> Result<Vec<TenseProgress>, ProgressError> {
        Ok(self.store.read().await?)
    }

    /// Local record for one tense, if it is in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the local store cannot be read.
    pub async fn record(&self, tense_id: &TenseId) -> Result<Option<TenseProgress>, ProgressError> {
        Ok(self
            .store
            .read()
            .await?
            .into_iter()
            .find(|r| &r.id == tense_id))
    }

    /// Dashboard aggregate over the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the local store cannot be read.
    pub async fn summary(&self) -> Result<ProgressSummary, ProgressError> {
        let snapshot = self.store.read().await?;
        Ok(ProgressSummary::from_snapshot(self.store.catalog(), &snapshot))
    }

    /// Record new progress for `tense_id`, stamped with the current time.
    ///
    /// The local write completes before any remote call. When `user_id` is
    /// present the record is then upserted remotely; that push is
    /// best-effort and its failure is only logged.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownTense` (nothing written) if the id is
    /// not in the catalog, or `ProgressError::Storage` if the local read or
    /// write fails (no remote push is attempted then).
    pub async fn update(
        &self,
        user_id: Option<&UserId>,
        tense_id: &TenseId,
        progress: Percent,
        status: TenseStatus,
    ) -> Result<TenseProgress, ProgressError> {
        self.update_with(user_id, tense_id, |_| Ok::<_, ProgressError>((progress, status)))
            .await
    }

    /// Like [`ProgressService::update`], with the new values computed from
    /// the current record while the gate is held.
    ///
    /// Nothing is written when `next` fails.
    ///
    /// # Errors
    ///
    /// Returns the error of `next`, or the `update` errors converted into `E`.
    pub async fn update_with<F, E>(
        &self,
        user_id: Option<&UserId>,
        tense_id: &TenseId,
        next: F,
    ) -> Result<TenseProgress, E>
    where
        F: FnOnce(&TenseProgress) -> Result<(Percent, TenseStatus), E>,
        E: From<ProgressError>,
    {
        let _guard = self.gate.enter().await;

        let mut snapshot = self.store.read().await.map_err(ProgressError::from)?;
        let now = self.clock.now();
        let slot = snapshot
            .iter_mut()
            .find(|r| &r.id == tense_id)
            .ok_or_else(|| ProgressError::UnknownTense(tense_id.clone()))?;
        let (progress, status) = next(&*slot)?;
        *slot = slot.updated(progress, status, now);
        let updated = slot.clone();

        self.store
            .write(&snapshot)
            .await
            .map_err(ProgressError::from)?;
        debug!(%tense_id, %progress, %status, "local progress updated");

        if let Some(user_id) = user_id {
            let row = updated.to_remote(user_id, now);
            let pushed = bounded(
                self.config.remote_timeout,
                self.remote.upsert_many(std::slice::from_ref(&row)),
            )
            .await;
            if let Err(error) = pushed {
                warn!(%user_id, %tense_id, %error, "remote progress upsert failed");
            }
        }

        Ok(updated)
    }
}
