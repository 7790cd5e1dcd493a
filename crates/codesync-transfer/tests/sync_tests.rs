//! End-to-end sync tests against a real server on the loopback interface
//!
//! Tests cover:
//! - Round trip of labeled and unlabeled roots
//! - Backup before write, and abort when the backup fails
//! - Server-side failures leaving the client untouched, before and after
//!   the response status was sent
//! - Roots with nothing to transfer
//! - Repeated syncs

mod common;

use codesync_archive::BackupManager;
use codesync_core::{ConfigRoot, SyncError, EXTENSIONS_LABEL, USER_LABEL};
use common::*;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

/// Bytes that gzip cannot shrink, so the server flushes body chunks early
fn incompressible(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

fn locked_rename(_from: &Path, _to: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::PermissionDenied,
        "directory is locked",
    ))
}

#[tokio::test]
async fn test_round_trip_labeled_roots() {
    let source = TempDir::new().unwrap();
    let src_user = source.path().join("User");
    let src_exts = source.path().join("extensions");
    write_user_settings(&src_user);
    fs::create_dir_all(src_exts.join("rust-lang.rust-analyzer-0.4.0")).unwrap();
    fs::write(
        src_exts.join("rust-lang.rust-analyzer-0.4.0/package.json"),
        r#"{"name": "rust-analyzer"}"#,
    )
    .unwrap();

    let server = TestServer::start(vec![
        ConfigRoot::labeled(USER_LABEL, &src_user),
        ConfigRoot::labeled(EXTENSIONS_LABEL, &src_exts),
    ])
    .await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("Code/User");
    let dst_exts = dest.path().join(".vscode/extensions");
    let roots = vec![
        ConfigRoot::labeled(USER_LABEL, &dst_user),
        ConfigRoot::labeled(EXTENSIONS_LABEL, &dst_exts),
    ];

    let report = test_client()
        .sync(&server.address(), &roots)
        .await
        .unwrap();

    // Nothing existed locally, so nothing was backed up
    assert!(report.backups.is_empty());
    assert_eq!(report.stats.files_written, 5);

    let mut expected = snapshot_tree(&src_user);
    expected.remove("Cache/tmp.bin");
    assert_eq!(snapshot_tree(&dst_user), expected);
    assert_eq!(snapshot_tree(&dst_exts), snapshot_tree(&src_exts));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_scenario_unlabeled_root() {
    let source = TempDir::new().unwrap();
    fs::create_dir_all(source.path().join("Cache")).unwrap();
    fs::create_dir_all(source.path().join("workspaceStorage/ws1")).unwrap();
    fs::write(source.path().join("settings.json"), vec![b's'; 10]).unwrap();
    fs::write(source.path().join("Cache/tmp.bin"), vec![0u8; 1000]).unwrap();
    fs::write(
        source.path().join("workspaceStorage/ws1/state.json"),
        vec![b'w'; 20],
    )
    .unwrap();

    let server = TestServer::start(vec![ConfigRoot::unlabeled(source.path())]).await;

    let dest = TempDir::new().unwrap();
    let target = dest.path().join("User");
    let report = test_client()
        .sync(&server.address(), &[ConfigRoot::unlabeled(&target)])
        .await
        .unwrap();

    assert_eq!(report.entry_count, 2);
    let tree = snapshot_tree(&target);
    assert_eq!(
        tree.keys().cloned().collect::<Vec<_>>(),
        vec!["settings.json", "workspaceStorage/ws1/state.json"]
    );
    assert_eq!(tree["settings.json"].len(), 10);
    assert_eq!(tree["workspaceStorage/ws1/state.json"].len(), 20);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_existing_destination_is_backed_up() {
    let source = TempDir::new().unwrap();
    write_user_settings(source.path());
    let server = TestServer::start(vec![ConfigRoot::labeled(USER_LABEL, source.path())]).await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    fs::create_dir_all(&dst_user).unwrap();
    fs::write(dst_user.join("settings.json"), "old settings").unwrap();
    fs::write(dst_user.join("only-local.json"), "local").unwrap();
    let before = snapshot_tree(&dst_user);

    let report = test_client()
        .sync(
            &server.address(),
            &[ConfigRoot::labeled(USER_LABEL, &dst_user)],
        )
        .await
        .unwrap();

    let backups = backups_of(&dst_user);
    assert_eq!(backups.len(), 1);
    assert_eq!(report.backups.len(), 1);
    assert_eq!(report.backups[0].backup(), backups[0].as_path());
    assert_eq!(snapshot_tree(&backups[0]), before);

    let after = snapshot_tree(&dst_user);
    assert!(!after.contains_key("only-local.json"));
    assert_eq!(
        after["settings.json"],
        fs::read(source.path().join("settings.json")).unwrap()
    );

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_backup_failure_leaves_destination_unchanged() {
    let source = TempDir::new().unwrap();
    write_user_settings(source.path());
    let server = TestServer::start(vec![ConfigRoot::labeled(USER_LABEL, source.path())]).await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    fs::create_dir_all(&dst_user).unwrap();
    fs::write(dst_user.join("settings.json"), "old settings").unwrap();
    let before = snapshot_tree(&dst_user);

    let client = test_client().with_backup_manager(BackupManager::with_rename(locked_rename));
    let err = client
        .sync(
            &server.address(),
            &[ConfigRoot::labeled(USER_LABEL, &dst_user)],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::BackupFailed { .. }));
    assert!(!err.touched_destination());
    assert_eq!(snapshot_tree(&dst_user), before);
    assert!(backups_of(&dst_user).is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_error_leaves_client_untouched() {
    let source = TempDir::new().unwrap();
    let missing = source.path().join("missing");
    let server = TestServer::start(vec![ConfigRoot::labeled(USER_LABEL, &missing)]).await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    fs::create_dir_all(&dst_user).unwrap();
    fs::write(dst_user.join("settings.json"), "old settings").unwrap();
    let before = snapshot_tree(&dst_user);

    let err = test_client()
        .sync(
            &server.address(),
            &[ConfigRoot::labeled(USER_LABEL, &dst_user)],
        )
        .await
        .unwrap_err();

    match &err {
        SyncError::Transport { message } => assert!(message.contains("500")),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(snapshot_tree(&dst_user), before);
    assert!(backups_of(&dst_user).is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Reserve a port, then free it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dest = TempDir::new().unwrap();
    let err = test_client()
        .sync(
            &addr.to_string(),
            &[ConfigRoot::unlabeled(dest.path().join("User"))],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Transport { .. }));
    assert!(!dest.path().join("User").exists());
}

#[tokio::test]
async fn test_repeated_sync_is_idempotent() {
    let source = TempDir::new().unwrap();
    write_user_settings(source.path());
    let server = TestServer::start(vec![ConfigRoot::labeled(USER_LABEL, source.path())]).await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    let roots = [ConfigRoot::labeled(USER_LABEL, &dst_user)];
    let client = test_client();

    client.sync(&server.address(), &roots).await.unwrap();
    let first = snapshot_tree(&dst_user);

    client.sync(&server.address(), &roots).await.unwrap();
    let second = snapshot_tree(&dst_user);

    assert_eq!(first, second);
    assert_eq!(backups_of(&dst_user).len(), 1);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_extensions_skipped_when_client_has_no_root() {
    let source = TempDir::new().unwrap();
    let src_user = source.path().join("User");
    let src_exts = source.path().join("extensions");
    write_user_settings(&src_user);
    fs::create_dir_all(src_exts.join("ext")).unwrap();
    fs::write(src_exts.join("ext/package.json"), "{}").unwrap();

    let server = TestServer::start(vec![
        ConfigRoot::labeled(USER_LABEL, &src_user),
        ConfigRoot::labeled(EXTENSIONS_LABEL, &src_exts),
    ])
    .await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    let report = test_client()
        .sync(
            &server.address(),
            &[ConfigRoot::labeled(USER_LABEL, &dst_user)],
        )
        .await
        .unwrap();

    assert_eq!(report.stats.skipped, 1);
    assert!(dst_user.join("settings.json").exists());
    assert!(!dest.path().join("extensions").exists());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_encode_failure_mid_stream_leaves_client_untouched() {
    let source = TempDir::new().unwrap();
    let src_user = source.path().join("User");
    write_user_settings(&src_user);
    fs::write(src_user.join("state.vscdb"), incompressible(256 * 1024)).unwrap();

    // The extensions root fails only after the User files were streamed
    let server = TestServer::start(vec![
        ConfigRoot::labeled(USER_LABEL, &src_user),
        ConfigRoot::labeled(EXTENSIONS_LABEL, source.path().join("missing")),
    ])
    .await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    fs::create_dir_all(&dst_user).unwrap();
    fs::write(dst_user.join("settings.json"), "old settings").unwrap();
    let before = snapshot_tree(&dst_user);

    let err = test_client()
        .sync(
            &server.address(),
            &[ConfigRoot::labeled(USER_LABEL, &dst_user)],
        )
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            SyncError::Transport { .. } | SyncError::InvalidArchive { .. }
        ),
        "unexpected error: {err:?}"
    );
    assert!(!err.touched_destination());
    assert_eq!(snapshot_tree(&dst_user), before);
    assert!(backups_of(&dst_user).is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_root_with_only_excluded_files_replaces_destination() {
    let source = TempDir::new().unwrap();
    fs::create_dir_all(source.path().join("Cache")).unwrap();
    fs::write(source.path().join("Cache/tmp.bin"), vec![0u8; 1000]).unwrap();
    let server = TestServer::start(vec![ConfigRoot::labeled(USER_LABEL, source.path())]).await;

    let dest = TempDir::new().unwrap();
    let dst_user = dest.path().join("User");
    fs::create_dir_all(&dst_user).unwrap();
    fs::write(dst_user.join("settings.json"), "old").unwrap();

    let report = test_client()
        .sync(
            &server.address(),
            &[ConfigRoot::labeled(USER_LABEL, &dst_user)],
        )
        .await
        .unwrap();

    assert_eq!(report.backups.len(), 1);
    assert_eq!(report.stats.files_written, 0);
    assert!(dst_user.is_dir());
    assert!(snapshot_tree(&dst_user).is_empty());
    assert_eq!(
        fs::read_to_string(report.backups[0].backup().join("settings.json")).unwrap(),
        "old"
    );

    server.stop().await.unwrap();
}
