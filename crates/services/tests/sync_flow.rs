use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lingua_core::TenseCatalog;
use lingua_core::model::{Percent, RemoteProgressRecord, TenseId, TenseProgress, TenseStatus, UserId};
use lingua_core::time::fixed_now;
use services::{Clock, ProgressError, ProgressService, SyncConfig, SyncGate, SyncOutcome, SyncService};
use storage::ProgressStore;
use storage::repository::{
    InMemoryKeyValueStore, InMemoryRemoteRepository, KeyValueStore, RemoteError,
    RemoteProgressRepository, StorageError,
};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn user() -> UserId {
    UserId::new("u1").unwrap()
}

fn row(tense: &str, progress: u8, status: TenseStatus, stamp: DateTime<Utc>) -> RemoteProgressRecord {
    RemoteProgressRecord {
        user_id: user(),
        tense_id: TenseId::new(tense),
        progress: Percent::new(progress).unwrap(),
        status,
        updated_at: stamp,
    }
}

fn find<'a>(records: &'a [TenseProgress], id: &str) -> &'a TenseProgress {
    records.iter().find(|r| r.id.as_str() == id).unwrap()
}

/// Remote double whose calls fail, hang, or count, depending on the mode.
#[derive(Default)]
struct ScriptedRemote {
    inner: InMemoryRemoteRepository,
    fail_fetch: bool,
    fail_upsert: bool,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    upserts: AtomicUsize,
}

#[async_trait]
impl RemoteProgressRepository for ScriptedRemote {
    async fn fetch_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRecord>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch {
            return Err(RemoteError::Network("offline".into()));
        }
        self.inner.fetch_all(user_id).await
    }

    async fn upsert_many(&self, records: &[RemoteProgressRecord]) -> Result<(), RemoteError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert {
            return Err(RemoteError::Backend { status: 503 });
        }
        self.inner.upsert_many(records).await
    }
}

/// Local store whose next read can be made to fail once.
struct FlakyStore {
    inner: InMemoryKeyValueStore,
    fail_next_read: AtomicBool,
    writes: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Connection("database is locked".into()));
        }
        self.inner.get_string(key).await
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_string(key, value).await
    }
}

struct Harness {
    kv: Arc<FlakyStore>,
    store: ProgressStore,
    remote: Arc<ScriptedRemote>,
    sync: SyncService,
    progress: ProgressService,
}

fn harness_with(kv: InMemoryKeyValueStore, remote: ScriptedRemote, config: SyncConfig) -> Harness {
    let kv = Arc::new(FlakyStore {
        inner: kv,
        fail_next_read: AtomicBool::new(false),
        writes: AtomicUsize::new(0),
    });
    let local: Arc<dyn KeyValueStore> = kv.clone();
    let store = ProgressStore::new(local, TenseCatalog::builtin());
    let remote = Arc::new(remote);
    let as_remote: Arc<dyn RemoteProgressRepository> = remote.clone();
    let gate = SyncGate::new();
    let clock = Clock::fixed(fixed_now());
    Harness {
        kv,
        store: store.clone(),
        remote,
        sync: SyncService::new(clock, store.clone(), Arc::clone(&as_remote), gate.clone(), config),
        progress: ProgressService::new(clock, store, as_remote, gate, config),
    }
}

fn harness(remote: ScriptedRemote) -> Harness {
    harness_with(InMemoryKeyValueStore::new(), remote, SyncConfig::default())
}

async fn set_local(store: &ProgressStore, record: TenseProgress) {
    let mut snapshot = store.read().await.unwrap();
    let slot = snapshot.iter_mut().find(|r| r.id == record.id).unwrap();
    *slot = record;
    store.write(&snapshot).await.unwrap();
}

#[tokio::test]
async fn newer_remote_row_replaces_unstamped_local_record() {
    let remote = ScriptedRemote::default();
    remote
        .inner
        .upsert_many(&[row("pres_simple", 70, TenseStatus::InProgress, at(2024, 1, 1))])
        .await
        .unwrap();
    let h = harness(remote);
    set_local(
        &h.store,
        TenseProgress {
            id: TenseId::new("pres_simple"),
            progress: Percent::new(40).unwrap(),
            status: TenseStatus::InProgress,
            updated_at: None,
        },
    )
    .await;

    let report = h.sync.sync(&user()).await;

    assert!(report.is_merged());
    let merged = find(&report.records, "pres_simple");
    assert_eq!(merged.progress.value(), 70);
    assert_eq!(merged.updated_at, Some(at(2024, 1, 1)));
    assert!(
        !report
            .uploads
            .iter()
            .any(|r| r.tense_id.as_str() == "pres_simple")
    );
    assert_eq!(find(&h.store.read().await.unwrap(), "pres_simple").progress.value(), 70);
}

#[tokio::test]
async fn local_only_record_is_pushed_with_its_stamp() {
    let h = harness(ScriptedRemote::default());
    set_local(
        &h.store,
        TenseProgress {
            id: TenseId::new("past_simple"),
            progress: Percent::FULL,
            status: TenseStatus::Mastered,
            updated_at: Some(at(2024, 6, 1)),
        },
    )
    .await;

    let report = h.sync.sync(&user()).await;

    assert_eq!(find(&report.records, "past_simple").progress, Percent::FULL);
    let pushed = report
        .uploads
        .iter()
        .find(|r| r.tense_id.as_str() == "past_simple")
        .unwrap();
    assert_eq!(pushed.updated_at, at(2024, 6, 1));
    assert!(report.uploaded_tenses().any(|t| t.as_str() == "past_simple"));
    assert!(report.upload_error.is_none());

    let remote_rows = h.remote.inner.fetch_all(&user()).await.unwrap();
    assert!(remote_rows.iter().any(|r| r.tense_id.as_str() == "past_simple"));
}

#[tokio::test]
async fn update_survives_failed_remote_push() {
    let h = harness(ScriptedRemote {
        fail_upsert: true,
        ..ScriptedRemote::default()
    });

    let updated = h
        .progress
        .update(
            Some(&user()),
            &TenseId::new("fut_simple"),
            Percent::new(60).unwrap(),
            TenseStatus::InProgress,
        )
        .await
        .unwrap();

    assert_eq!(updated.progress.value(), 60);
    assert_eq!(updated.updated_at, Some(fixed_now()));
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 1);
    let local = h.store.read().await.unwrap();
    assert_eq!(find(&local, "fut_simple").progress.value(), 60);
    assert_eq!(find(&local, "fut_simple").status, TenseStatus::InProgress);
}

#[tokio::test]
async fn update_without_user_stays_local() {
    let h = harness(ScriptedRemote::default());
    h.progress
        .update(
            None,
            &TenseId::new("pres_perf"),
            Percent::new(10).unwrap(),
            TenseStatus::InProgress,
        )
        .await
        .unwrap();
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 0);
    assert_eq!(find(&h.store.read().await.unwrap(), "pres_perf").progress.value(), 10);
}

#[tokio::test]
async fn unknown_tense_leaves_snapshot_untouched() {
    let h = harness(ScriptedRemote::default());
    let before = h.store.read().await.unwrap();
    let result = h
        .progress
        .update(
            Some(&user()),
            &TenseId::new("pluperfect"),
            Percent::new(10).unwrap(),
            TenseStatus::InProgress,
        )
        .await;
    assert!(matches!(result, Err(ProgressError::UnknownTense(_))));
    assert_eq!(h.store.read().await.unwrap(), before);
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_fetch_returns_local_without_writing_or_pushing() {
    let h = harness(ScriptedRemote {
        fail_fetch: true,
        ..ScriptedRemote::default()
    });
    let before = h.store.read().await.unwrap();

    let report = h.sync.sync(&user()).await;

    assert!(matches!(
        report.outcome,
        SyncOutcome::RemoteUnavailable(RemoteError::Network(_))
    ));
    assert_eq!(report.records, before);
    assert!(report.uploads.is_empty());
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 0);
    assert!(
        h.kv
            .get_string(storage::PROGRESS_KEY)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn slow_fetch_is_treated_as_unavailable() {
    let h = harness_with(
        InMemoryKeyValueStore::new(),
        ScriptedRemote {
            delay: Some(Duration::from_millis(500)),
            ..ScriptedRemote::default()
        },
        SyncConfig {
            remote_timeout: Duration::from_millis(20),
        },
    );

    let report = h.sync.sync(&user()).await;

    assert!(matches!(
        report.outcome,
        SyncOutcome::RemoteUnavailable(RemoteError::Timeout)
    ));
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_failure_is_reported_not_raised() {
    let h = harness(ScriptedRemote {
        fail_upsert: true,
        ..ScriptedRemote::default()
    });

    let report = h.sync.sync(&user()).await;

    assert!(report.is_merged());
    assert!(matches!(
        report.upload_error,
        Some(RemoteError::Backend { status: 503 })
    ));
    // Merged snapshot was persisted before the push.
    assert!(
        h.kv
            .get_string(storage::PROGRESS_KEY)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn local_quota_failure_keeps_merged_records() {
    let remote = ScriptedRemote::default();
    remote
        .inner
        .upsert_many(&[row("fut_simple", 80, TenseStatus::InProgress, at(2024, 2, 1))])
        .await
        .unwrap();
    let h = harness_with(InMemoryKeyValueStore::with_quota(8), remote, SyncConfig::default());

    let report = h.sync.sync(&user()).await;

    assert!(report.storage_error.is_some());
    assert_eq!(find(&report.records, "fut_simple").progress.value(), 80);
    // The push still happens for seeds the remote has never seen.
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_sync_is_idempotent() {
    let remote = ScriptedRemote::default();
    remote
        .inner
        .upsert_many(&[
            row("pres_perf", 30, TenseStatus::InProgress, at(2024, 3, 1)),
            row("fut_cont", 100, TenseStatus::Mastered, at(2024, 3, 2)),
        ])
        .await
        .unwrap();
    let h = harness(remote);

    let first = h.sync.sync(&user()).await;
    assert!(!first.uploads.is_empty());

    let second = h.sync.sync(&user()).await;
    assert_eq!(second.records, first.records);
    assert!(second.uploads.is_empty());
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_remote_row_does_not_overwrite_newer_local() {
    let remote = ScriptedRemote::default();
    remote
        .inner
        .upsert_many(&[row("past_cont", 20, TenseStatus::InProgress, at(2024, 1, 1))])
        .await
        .unwrap();
    let h = harness(remote);
    set_local(
        &h.store,
        TenseProgress {
            id: TenseId::new("past_cont"),
            progress: Percent::new(55).unwrap(),
            status: TenseStatus::InProgress,
            updated_at: Some(at(2024, 5, 1)),
        },
    )
    .await;

    let report = h.sync.sync(&user()).await;

    assert_eq!(find(&report.records, "past_cont").progress.value(), 55);
    let remote_rows = h.remote.inner.fetch_all(&user()).await.unwrap();
    let pushed = remote_rows
        .iter()
        .find(|r| r.tense_id.as_str() == "past_cont")
        .unwrap();
    assert_eq!(pushed.progress.value(), 55);
    assert_eq!(pushed.updated_at, at(2024, 5, 1));
}

#[tokio::test]
async fn concurrent_updates_do_not_lose_writes() {
    let h = harness(ScriptedRemote {
        delay: Some(Duration::from_millis(5)),
        ..ScriptedRemote::default()
    });
    let progress = Arc::new(h.progress);
    let ids = ["pres_simple", "pres_perf", "past_cont", "fut_simple"];

    let mut tasks = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let progress = Arc::clone(&progress);
        let id = TenseId::new(*id);
        tasks.push(tokio::spawn(async move {
            let value = Percent::new(10 * (i as u8 + 1)).unwrap();
            progress
                .update(Some(&user()), &id, value, TenseStatus::InProgress)
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let local = h.store.read().await.unwrap();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(find(&local, id).progress.value(), 10 * (i as u8 + 1));
    }
}

#[tokio::test]
async fn unreadable_local_store_skips_sync_and_keeps_progress() {
    let h = harness(ScriptedRemote::default());
    h.progress
        .update(
            None,
            &TenseId::new("fut_simple"),
            Percent::new(60).unwrap(),
            TenseStatus::InProgress,
        )
        .await
        .unwrap();
    let writes = h.kv.writes.load(Ordering::SeqCst);

    h.kv.fail_next_read.store(true, Ordering::SeqCst);
    let report = h.sync.sync(&user()).await;

    assert!(matches!(
        report.outcome,
        SyncOutcome::LocalUnavailable(StorageError::Connection(_))
    ));
    assert!(report.records().is_empty());
    assert!(report.uploads.is_empty());
    assert_eq!(h.kv.writes.load(Ordering::SeqCst), writes);
    assert_eq!(h.remote.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 0);

    let kept = h.store.read().await.unwrap();
    assert_eq!(find(&kept, "fut_simple").progress.value(), 60);
}

#[tokio::test]
async fn unreadable_local_store_fails_update_without_writing() {
    let h = harness(ScriptedRemote::default());
    h.kv.fail_next_read.store(true, Ordering::SeqCst);

    let result = h
        .progress
        .update(
            Some(&user()),
            &TenseId::new("pres_simple"),
            Percent::new(20).unwrap(),
            TenseStatus::InProgress,
        )
        .await;

    assert!(matches!(
        result,
        Err(ProgressError::Storage(StorageError::Connection(_)))
    ));
    assert_eq!(h.kv.writes.load(Ordering::SeqCst), 0);
    assert_eq!(h.remote.upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_bad_stored_entry_does_not_reset_the_others() {
    let kv = InMemoryKeyValueStore::new();
    kv.set_string(
        storage::PROGRESS_KEY,
        r#"[{"id":"fut_simple","progress":60,"status":"IN_PROGRESS","updated_at":"2024-06-01T00:00:00Z"},
            {"id":"pres_perf","progress":80,"status":"IN_PROGRESS","updated_at":"2024-06-01T00:00:00Z"},
            {"id":"past_perf","progress":101,"status":"IN_PROGRESS","updated_at":"2024-06-01T00:00:00Z"}]"#,
    )
    .await
    .unwrap();
    let h = harness_with(kv, ScriptedRemote::default(), SyncConfig::default());

    h.progress
        .update(
            None,
            &TenseId::new("pres_simple"),
            Percent::new(20).unwrap(),
            TenseStatus::InProgress,
        )
        .await
        .unwrap();

    let local = h.store.read().await.unwrap();
    assert_eq!(find(&local, "fut_simple").progress.value(), 60);
    assert_eq!(find(&local, "pres_perf").progress.value(), 80);
    assert_eq!(find(&local, "pres_simple").progress.value(), 20);
    assert_eq!(find(&local, "past_perf").progress, Percent::ZERO);
}
