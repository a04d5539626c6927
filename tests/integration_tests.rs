//! Integration tests for s3-sync
//!
//! Every run here goes through the full coordinator (enumerators, queues,
//! worker pools, barrier) against an in-memory store and a scratch root.

use chrono::{DateTime, Duration, TimeZone, Utc};
use s3_sync::config::Scope;
use s3_sync::error::SyncError;
use s3_sync::reconcile::{
    check, reconcile_files, reconcile_objects, CollectingSink, ReconcileCoordinator, RunContext,
};
use s3_sync::store::{MemoryStore, ObjectStore};
use s3_sync::types::{Action, SyncMode};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::tempdir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn write_file(root: &Path, rel: &str, data: &[u8], modified: DateTime<Utc>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, data).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::from(modified))
        .unwrap();
}

fn context(mode: SyncMode, root: &Path, store: &Arc<MemoryStore>) -> RunContext {
    let store: Arc<dyn ObjectStore> = store.clone();
    RunContext::new(mode, root, store, 1000).with_workers(4)
}

#[test]
fn test_backup_uploads_missing_file() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"0123456789", base_time());
    let store = Arc::new(MemoryStore::new("bucket"));
    let sink = Arc::new(CollectingSink::new());

    let result =
        reconcile_files(context(SyncMode::BackupLive, dir.path(), &store), sink.clone()).unwrap();

    assert_eq!(result.count(Action::UploadFile), 1);
    assert_eq!(result.bytes(), 10);
    let meta = store.head_object("/a.txt").unwrap().unwrap();
    assert_eq!(meta.size, 10);

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    let text = lines[0].to_string();
    assert!(text.starts_with("file-"), "{text}");
    assert!(text.contains("\tAction: UploadFile\tItem: "), "{text}");
    assert!(text.ends_with("a.txt"), "{text}");
}

#[test]
fn test_restore_downloads_missing_object() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/b.txt", b"12345".to_vec(), base_time());

    let result = reconcile_objects(
        context(SyncMode::RestoreLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();

    assert_eq!(result.count(Action::DownloadObject), 1);
    let meta = fs::metadata(dir.path().join("b.txt")).unwrap();
    assert_eq!(meta.len(), 5);
}

#[test]
fn test_restore_all_keeps_downloaded_files() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/a.txt", b"aaa".to_vec(), base_time());
    // not in the key form this tool writes, so it is left alone
    store.insert("b.txt", b"12345".to_vec(), base_time());

    let sink = Arc::new(CollectingSink::new());
    let result = ReconcileCoordinator::new(
        context(SyncMode::RestoreLive, dir.path(), &store),
        sink.clone(),
    )
    .reconcile(Scope::All)
    .unwrap();

    assert_eq!(result.count(Action::DownloadObject), 1);
    assert_eq!(result.count(Action::DeleteFile), 0);
    assert_eq!(result.count(Action::None), 2);
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"aaa");
    assert!(!dir.path().join("b.txt").exists());

    let skipped = sink.with_action(Action::None);
    assert!(skipped.iter().any(|l| l.item == "b.txt"), "{skipped:?}");
    assert_eq!(store.len(), 2);
}

#[test]
fn test_folder_markers_are_left_alone() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/photos/", Vec::new(), base_time());
    store.insert("/photos/a.jpg", b"jpeg".to_vec(), base_time());

    let sink = Arc::new(CollectingSink::new());
    let restore = ReconcileCoordinator::new(
        context(SyncMode::RestoreLive, dir.path(), &store).with_workers(1),
        sink.clone(),
    )
    .reconcile(Scope::All)
    .unwrap();

    assert_eq!(restore.count(Action::DownloadObject), 1);
    assert_eq!(fs::read(dir.path().join("photos/a.jpg")).unwrap(), b"jpeg");
    let marker = sink
        .lines()
        .into_iter()
        .find(|l| l.item == "/photos/")
        .unwrap();
    assert_eq!(marker.action, Action::None);

    let backup = reconcile_objects(
        context(SyncMode::BackupLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();
    assert_eq!(backup.count(Action::DeleteObject), 0);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_backup_object_side_refreshes_stale_object() {
    let dir = tempdir().unwrap();
    write_file(
        dir.path(),
        "report.csv",
        b"col1,col2\n1,2\n",
        base_time() + Duration::hours(1),
    );
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/report.csv", b"col1\n".to_vec(), base_time());

    let result = reconcile_objects(
        context(SyncMode::BackupLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();

    assert_eq!(result.count(Action::UploadFile), 1);
    assert_eq!(result.totals().applied, 1);
    assert_eq!(
        store.contents("/report.csv").unwrap(),
        b"col1,col2\n1,2\n"
    );
    assert_eq!(store.calls().put, 1);
}

#[test]
fn test_backup_mock_reports_without_uploading() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"0123456789", base_time());
    let store = Arc::new(MemoryStore::new("bucket"));
    let sink = Arc::new(CollectingSink::new());

    let result =
        reconcile_files(context(SyncMode::BackupMock, dir.path(), &store), sink.clone()).unwrap();

    assert_eq!(result.count(Action::UploadFile), 1);
    assert_eq!(sink.with_action(Action::UploadFile).len(), 1);
    assert!(store.is_empty());
    assert_eq!(store.calls().transfers(), 0);
}

#[test]
fn test_newer_local_file_with_equal_size() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "d.txt", b"same", base_time() + Duration::seconds(1));
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/d.txt", b"SAME".to_vec(), base_time());

    let backup = reconcile_files(
        context(SyncMode::BackupMock, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();
    assert_eq!(backup.count(Action::UploadFile), 1);

    let restore = reconcile_files(
        context(SyncMode::RestoreMock, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();
    assert_eq!(restore.count(Action::DownloadObject), 1);
}

#[test]
fn test_backup_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let now = Utc::now() - Duration::minutes(5);
    write_file(dir.path(), "one.txt", b"1", now);
    write_file(dir.path(), "nested/two.txt", b"22", now);
    write_file(dir.path(), "nested/deeper/three.txt", b"333", now);
    let store = Arc::new(MemoryStore::new("bucket"));

    let first = ReconcileCoordinator::new(
        context(SyncMode::BackupLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .reconcile(Scope::All)
    .unwrap();
    assert_eq!(first.count(Action::UploadFile), 3);

    let second = ReconcileCoordinator::new(
        context(SyncMode::BackupLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .reconcile(Scope::All)
    .unwrap();
    assert_eq!(second.count(Action::None), 6);
    assert_eq!(second.items(), 6);
    assert_eq!(store.calls().put, 3);
}

#[test]
fn test_restore_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/x/y.txt", b"yyy".to_vec(), base_time());
    store.insert("/z.txt", b"z".to_vec(), base_time());

    let coordinator = ReconcileCoordinator::new(
        context(SyncMode::RestoreLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    );
    let first = coordinator.reconcile(Scope::All).unwrap();
    assert_eq!(first.count(Action::DownloadObject), 2);

    let second = coordinator.reconcile(Scope::All).unwrap();
    assert_eq!(second.count(Action::DownloadObject), 0);
    assert_eq!(second.count(Action::None), 4);
    assert_eq!(fs::read(dir.path().join("x/y.txt")).unwrap(), b"yyy");
}

#[test]
fn test_restore_removes_local_orphans() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "orphan.txt", b"o", base_time());
    let store = Arc::new(MemoryStore::new("bucket"));

    let result = reconcile_files(
        context(SyncMode::RestoreLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();

    assert_eq!(result.count(Action::DeleteFile), 1);
    assert!(!dir.path().join("orphan.txt").exists());
}

#[test]
fn test_check_never_mutates() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "local-only.txt", b"l", base_time());
    write_file(dir.path(), "stale.txt", b"old", base_time());
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/remote-only.txt", b"r".to_vec(), base_time());
    store.insert("/stale.txt", b"newer data".to_vec(), base_time());

    for mode in [SyncMode::BackupLive, SyncMode::RestoreLive] {
        let sink = Arc::new(CollectingSink::new());
        let result = check(context(mode, dir.path(), &store), sink.clone()).unwrap();

        assert!(!result.mode.is_live());
        assert_eq!(result.items(), 4);
        assert_eq!(sink.lines().len(), 4);
        assert_eq!(result.totals().applied, 0);
    }

    assert_eq!(store.calls().transfers(), 0);
    assert_eq!(store.len(), 2);
    assert!(dir.path().join("local-only.txt").exists());
    assert_eq!(fs::read(dir.path().join("stale.txt")).unwrap(), b"old");
    assert!(!dir.path().join("remote-only.txt").exists());
}

#[test]
fn test_check_classifies_both_sides() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "local-only.txt", b"l", base_time());
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/remote-only.txt", b"r".to_vec(), base_time());

    let backup = check(
        context(SyncMode::BackupMock, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();
    assert_eq!(backup.count(Action::UploadFile), 1);
    assert_eq!(backup.count(Action::DeleteObject), 1);

    let restore = check(
        context(SyncMode::RestoreMock, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();
    assert_eq!(restore.count(Action::DeleteFile), 1);
    assert_eq!(restore.count(Action::DownloadObject), 1);
}

#[test]
fn test_empty_sides_complete() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));

    let result = check(
        context(SyncMode::BackupMock, dir.path(), &store).with_workers(16),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();

    assert_eq!(result.items(), 0);
    assert_eq!(result.files.unwrap().enumeration.emitted, 0);
    assert_eq!(result.objects.unwrap().enumeration.emitted, 0);
}

#[test]
fn test_small_queue_many_items() {
    let dir = tempdir().unwrap();
    for i in 0..200 {
        write_file(dir.path(), &format!("d{}/f{i}.txt", i % 7), b"data", base_time());
    }
    let store = Arc::new(MemoryStore::new("bucket").with_page_size(17));

    let ctx = context(SyncMode::BackupLive, dir.path(), &store).with_queue_size(2);
    let result = reconcile_files(ctx, Arc::new(CollectingSink::new())).unwrap();

    assert_eq!(result.count(Action::UploadFile), 200);
    assert_eq!(store.len(), 200);

    let objects = reconcile_objects(
        context(SyncMode::BackupMock, dir.path(), &store).with_queue_size(2),
        Arc::new(CollectingSink::new()),
    )
    .unwrap();
    assert_eq!(objects.count(Action::None), 200);
    assert_eq!(objects.objects.unwrap().enumeration.emitted, 200);
}

#[test]
fn test_action_failure_aborts_run() {
    let dir = tempdir().unwrap();
    for i in 0..50 {
        write_file(dir.path(), &format!("f{i:02}.txt"), b"x", base_time());
    }
    let store = Arc::new(MemoryStore::new("bucket"));
    store.insert("/f07.txt", b"old contents".to_vec(), base_time());
    store.fail_key("/f07.txt");

    let err = reconcile_files(
        context(SyncMode::BackupLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    )
    .unwrap_err();

    let msg = err.to_string();
    assert!(matches!(err, SyncError::Store(_) | SyncError::Action(_)), "{msg}");
    assert!(msg.contains("/f07.txt"), "{msg}");
}

#[test]
fn test_overlong_path_aborts_run() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "short.txt", b"x", base_time());
    write_file(dir.path(), &"n".repeat(120), b"x", base_time());
    let store = Arc::new(MemoryStore::new("bucket"));

    let max = dir.path().as_os_str().len() + 60;
    let store_dyn: Arc<dyn ObjectStore> = store.clone();
    let ctx = RunContext::new(SyncMode::BackupMock, dir.path(), store_dyn, max);

    let err = reconcile_files(ctx, Arc::new(CollectingSink::new())).unwrap_err();
    assert!(matches!(err, SyncError::Enumerate(_)), "{err}");
}

#[test]
fn test_interrupted_run() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));
    let coordinator = ReconcileCoordinator::new(
        context(SyncMode::BackupLive, dir.path(), &store),
        Arc::new(CollectingSink::new()),
    );

    coordinator
        .shutdown_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);
    assert!(matches!(
        coordinator.reconcile(Scope::All),
        Err(SyncError::Interrupted)
    ));
    assert_eq!(store.calls().list, 0);
}
