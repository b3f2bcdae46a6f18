//! Last-writer-wins reconciliation between the local snapshot and the remote
//! progress rows of one user.
//!
//! Everything here is pure; the services layer performs the I/O around it.

use chrono::{DateTime, Utc};

use crate::catalog::TenseCatalog;
use crate::model::{RemoteProgressRecord, TenseProgress, UserId};

/// Result of reconciling one user's remote rows against the local snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Snapshot to persist locally and hand back to the caller.
    pub merged: Vec<TenseProgress>,
    /// Records to upsert remotely, one per tense at most.
    pub uploads: Vec<RemoteProgressRecord>,
    /// Remote rows ignored because they belong to another user.
    pub foreign_rows: usize,
}

/// Timestamp used for comparison; an unset local stamp sorts before any real one.
fn local_stamp(record: &TenseProgress) -> DateTime<Utc> {
    record.updated_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn counterpart<'a>(
    record: &TenseProgress,
    remote: &'a [RemoteProgressRecord],
) -> Option<&'a RemoteProgressRecord> {
    remote.iter().find(|r| r.tense_id == record.id)
}

/// Merges remote rows into the local snapshot.
///
/// The remote values replace a local record only when the remote
/// `updated_at` is strictly later. Ties keep the local record.
#[must_use]
pub fn merge_remote(local: &[TenseProgress], remote: &[RemoteProgressRecord]) -> Vec<TenseProgress> {
    local
        .iter()
        .map(|record| match counterpart(record, remote) {
            Some(r) if r.updated_at > local_stamp(record) => TenseProgress {
                id: record.id.clone(),
                progress: r.progress,
                status: r.status,
                updated_at: Some(r.updated_at),
            },
            _ => record.clone(),
        })
        .collect()
}

/// Selects the merged records that must be pushed back to the remote table.
///
/// A record is uploaded when it has no remote counterpart and differs from
/// its seed (`progress > 0` or a changed status), or when its local stamp is
/// strictly later than the remote one. Unstamped records are sent with `now`.
#[must_use]
pub fn upload_set(
    merged: &[TenseProgress],
    remote: &[RemoteProgressRecord],
    catalog: &TenseCatalog,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Vec<RemoteProgressRecord> {
    merged
        .iter()
        .filter(|record| match counterpart(record, remote) {
            None => {
                !record.progress.is_zero()
                    || catalog.seed_status(&record.id) != Some(record.status)
            }
            Some(r) => local_stamp(record) > r.updated_at,
        })
        .map(|record| record.to_remote(user_id, now))
        .collect()
}

/// Full reconciliation: drop foreign rows, merge, then compute the upload set
/// against the rows as they were fetched.
///
/// Unstamped records that get uploaded are stamped with `now` locally too, so
/// the local snapshot and the pushed rows agree and a second pass is a no-op.
#[must_use]
pub fn reconcile(
    local: &[TenseProgress],
    remote: Vec<RemoteProgressRecord>,
    catalog: &TenseCatalog,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Reconciliation {
    let total = remote.len();
    let own: Vec<RemoteProgressRecord> = remote
        .into_iter()
        .filter(|r| &r.user_id == user_id)
        .collect();
    let foreign_rows = total - own.len();

    let mut merged = merge_remote(local, &own);
    let uploads = upload_set(&merged, &own, catalog, user_id, now);
    for record in merged.iter_mut().filter(|r| r.updated_at.is_none()) {
        if uploads.iter().any(|u| u.tense_id == record.id) {
            record.updated_at = Some(now);
        }
    }

    Reconciliation {
        merged,
        uploads,
        foreign_rows,
    }
}
