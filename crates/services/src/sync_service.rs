use std::sync::Arc;

use lingua_core::merge;
use lingua_core::model::{RemoteProgressRecord, TenseId, TenseProgress, UserId};
use storage::ProgressStore;
use storage::repository::{RemoteError, RemoteProgressRepository, StorageError};
use tracing::{info, warn};

use crate::Clock;
use crate::config::SyncConfig;
use crate::gate::{SyncGate, bounded};

/// How the remote side took part in a sync.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Remote rows were fetched and merged.
    Merged,
    /// Fetching failed; the local snapshot was returned untouched.
    RemoteUnavailable(RemoteError),
    /// The local snapshot could not be read; nothing was fetched, written or
    /// pushed and `records` is empty.
    LocalUnavailable(StorageError),
}

/// Result of one sync call. Failures are reported as values, never raised.
#[derive(Debug)]
pub struct SyncReport {
    pub records: Vec<TenseProgress>,
    pub outcome: SyncOutcome,
    /// Rows selected for push-back, whether or not the push succeeded.
    pub uploads: Vec<RemoteProgressRecord>,
    pub upload_error: Option<RemoteError>,
    /// Local persistence failure; `records` remains authoritative for this
    /// process but may be lost on restart.
    pub storage_error: Option<StorageError>,
}

impl SyncReport {
    fn unavailable(records: Vec<TenseProgress>, error: RemoteError) -> Self {
        Self {
            records,
            outcome: SyncOutcome::RemoteUnavailable(error),
            uploads: Vec::new(),
            upload_error: None,
            storage_error: None,
        }
    }

    fn local_unavailable(error: StorageError) -> Self {
        Self {
            records: Vec::new(),
            outcome: SyncOutcome::LocalUnavailable(error),
            uploads: Vec::new(),
            upload_error: None,
            storage_error: None,
        }
    }

    #[must_use]
    pub fn is_merged(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Merged)
    }

    #[must_use]
    pub fn records(&self) -> &[TenseProgress] {
        &self.records
    }

    /// Tense ids of the rows selected for push-back.
    pub fn uploaded_tenses(&self) -> impl Iterator<Item = &TenseId> {
        self.uploads.iter().map(|r| &r.tense_id)
    }

    #[must_use]
    pub fn into_records(self) -> Vec<TenseProgress> {
        self.records
    }
}

/// Reconciles the local snapshot with one user's remote progress rows.
#[derive(Clone)]
pub struct SyncService {
    clock: Clock,
    store: ProgressStore,
    remote: Arc<dyn RemoteProgressRepository>,
    gate: SyncGate,
    config: SyncConfig,
}

impl SyncService {
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

    /// Pull, merge, persist, then push the locally newer records.
    ///
    /// - A failed local read ends the sync before any remote call.
    /// - A failed or timed-out fetch returns the local snapshot as-is with
    ///   no write and no upload.
    /// - The merged snapshot is written locally before anything is pushed.
    /// - Upload failures are logged and reported, never retried here.
    pub async fn sync(&self, user_id: &UserId) -> SyncReport {
        let _guard = self.gate.enter().await;

        let local = match self.store.read().await {
            Ok(records) => records,
            Err(error) => {
                warn!(%user_id, %error, "local progress unreadable, skipping sync");
                return SyncReport::local_unavailable(error);
            }
        };

        let remote = match bounded(self.config.remote_timeout, self.remote.fetch_all(user_id)).await
        {
            Ok(rows) => rows,
            Err(error) => {
                warn!(%user_id, %error, "remote progress fetch failed, keeping local snapshot");
                return SyncReport::unavailable(local, error);
            }
        };
        let fetched = remote.len();

        let reconciliation = merge::reconcile(
            &local,
            remote,
            self.store.catalog(),
            user_id,
            self.clock.now(),
        );
        if reconciliation.foreign_rows > 0 {
            warn!(
                %user_id,
                foreign_rows = reconciliation.foreign_rows,
                "remote returned rows of other users, ignoring them"
            );
        }

        let storage_error = match self.store.write(&reconciliation.merged).await {
            Ok(()) => None,
            Err(error) => {
                warn!(%user_id, %error, "failed to persist merged progress locally");
                Some(error)
            }
        };

        let upload_error = if reconciliation.uploads.is_empty() {
            None
        } else {
            match bounded(
                self.config.remote_timeout,
                self.remote.upsert_many(&reconciliation.uploads),
            )
            .await
            {
                Ok(()) => None,
                Err(error) => {
                    warn!(
                        %user_id,
                        %error,
                        uploads = reconciliation.uploads.len(),
                        "failed to push local progress"
                    );
                    Some(error)
                }
            }
        };

        info!(
            %user_id,
            fetched,
            uploads = reconciliation.uploads.len(),
            "progress sync finished"
        );

        SyncReport {
            records: reconciliation.merged,
            outcome: SyncOutcome::Merged,
            uploads: reconciliation.uploads,
            upload_error,
            storage_error,
        }
    }
}
