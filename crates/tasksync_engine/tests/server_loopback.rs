//! Orchestrator and HTTP transport against the reference server.

mod common;

use common::{device, device_with_token, server, server_with, ServerAdapter, BASE_URL};
use std::sync::Arc;
use std::time::Duration;
use tasksync_engine::{
    ConflictChoice, HttpTransport, LoopbackClient, RemoteTransport, SyncAction, SyncConfig,
    SyncError, SyncOrchestrator, SyncStatus,
};
use tasksync_server::{AuthConfig, ServerConfig, TokenValidator};
use tasksync_testkit::{snapshot_with_tasks, SnapshotBuilder, TempStores};

#[test]
fn transport_round_trip() {
    let server = server();
    let transport = HttpTransport::new(BASE_URL, LoopbackClient::new(ServerAdapter(Arc::clone(&server))));

    assert_eq!(transport.fetch_remote().unwrap(), None);

    let receipt = transport.push_remote(&snapshot_with_tasks(3, 0, 10)).unwrap();
    assert_eq!(receipt.version, 1);
    let receipt = transport.push_remote(&snapshot_with_tasks(3, 7, 20)).unwrap();
    assert_eq!(receipt.version, 7);

    let remote = transport.fetch_remote().unwrap().unwrap();
    assert_eq!(remote.version, 7);
    assert_eq!(remote.last_modified, 20);
    assert_eq!(server.request_count(), 4);
}

#[test]
fn shared_secret_auth() {
    let server = server_with(ServerConfig::new().with_shared_secret("s3cret"));

    let good = device_with_token(&server, 100, "s3cret");
    good.write(snapshot_with_tasks(1, 0, 0));
    let report = good.orchestrator.tick().unwrap().unwrap();
    assert_eq!(report.pushed_version, Some(1));

    let bad = device_with_token(&server, 100, "guess");
    let err = bad.orchestrator.sync_now().unwrap_err();
    assert!(matches!(err, SyncError::AuthenticationFailed(_)));
    assert!(!err.is_retryable());
    assert_eq!(bad.orchestrator.status(), SyncStatus::Error);
}

#[test]
fn signed_token_auth() {
    let auth = AuthConfig::new(b"server-key".to_vec()).with_expiry(Duration::from_secs(3600));
    let token = TokenValidator::new(auth.clone()).create_token("laptop").unwrap();
    let server = server_with(ServerConfig::new().with_signed_tokens(auth));

    let device = device_with_token(&server, 100, &token);
    device.write(snapshot_with_tasks(2, 0, 0));
    assert!(device.orchestrator.tick().unwrap().is_some());
    assert_eq!(server.current_version(), Some(1));
}

#[test]
fn unload_pushes_owed_write() {
    let server = server();
    let device = device(&server, 100);
    device.orchestrator.start().unwrap();

    device
        .orchestrator
        .record_mutation(SnapshotBuilder::new().last_modified(150).task("late", 150).build());
    assert!(device.orchestrator.has_unsaved_mutation());

    let receipt = device.orchestrator.flush_on_unload().unwrap().unwrap();
    assert_eq!(receipt.version, 1);
    assert!(server.snapshot().unwrap().unwrap().task("late").is_some());
    assert_eq!(device.local().unwrap().version, 1);
    assert!(!device.orchestrator.has_pending_push());

    // Nothing owed the second time.
    assert_eq!(device.orchestrator.flush_on_unload().unwrap(), None);
}

#[test]
fn discarding_merge_keeps_local_side() {
    let server = server();
    server
        .seed(&SnapshotBuilder::new().version(4).last_modified(90).task("theirs", 80).build())
        .unwrap();
    let device = device(&server, 200);
    device.orchestrator.tracker().record_sync_at(3, 50).unwrap();
    device.write(SnapshotBuilder::new().version(3).task("mine", 150).build());

    let report = device.orchestrator.tick().unwrap().unwrap();
    assert_eq!(report.action, SyncAction::Merge);
    assert_eq!(server.current_version(), Some(5));

    let review = device.orchestrator.conflict_review().unwrap();
    assert!(review.merged.task("mine").is_some());
    assert!(review.merged.task("theirs").is_some());

    let receipt = device
        .orchestrator
        .resolve_conflict(ConflictChoice::Local)
        .unwrap()
        .unwrap();
    assert_eq!(receipt.version, 6);

    let stored = server.snapshot().unwrap().unwrap();
    assert!(stored.task("mine").is_some());
    assert!(stored.task("theirs").is_none());
    assert_eq!(device.orchestrator.tracker().last_version(), 6);
    assert!(matches!(
        device.orchestrator.resolve_conflict(ConflictChoice::Local),
        Err(SyncError::NoConflictPending)
    ));
}

#[test]
fn discarding_merge_keeps_remote_side() {
    let server = server();
    server
        .seed(&SnapshotBuilder::new().version(4).last_modified(90).task("theirs", 80).build())
        .unwrap();
    let device = device(&server, 200);
    device.orchestrator.tracker().record_sync_at(3, 50).unwrap();
    device.write(SnapshotBuilder::new().version(3).task("mine", 150).build());
    device.orchestrator.tick().unwrap();

    let requests = server.request_count();
    assert_eq!(
        device.orchestrator.resolve_conflict(ConflictChoice::Remote).unwrap(),
        None
    );
    assert_eq!(server.request_count(), requests);

    let local = device.local().unwrap();
    assert_eq!(local.version, 4);
    assert!(local.task("mine").is_none());
    assert_eq!(device.orchestrator.tracker().last_version(), 4);
}

#[test]
fn file_backed_device_survives_restart() {
    let server = server();
    server.seed(&snapshot_with_tasks(4, 2, 500)).unwrap();
    let stores = TempStores::new();

    {
        let orchestrator = SyncOrchestrator::new(
            HttpTransport::new(BASE_URL, LoopbackClient::new(ServerAdapter(Arc::clone(&server)))),
            stores.snapshot_store(),
            stores.tracker(),
            SyncConfig::default(),
        );
        let report = orchestrator.start().unwrap().unwrap();
        assert_eq!(report.action, SyncAction::TakeRemote);
    }

    let orchestrator = SyncOrchestrator::new(
        HttpTransport::new(BASE_URL, LoopbackClient::new(ServerAdapter(Arc::clone(&server)))),
        stores.snapshot_store(),
        stores.tracker(),
        SyncConfig::default(),
    );
    assert_eq!(orchestrator.tracker().last_version(), 2);
    let report = orchestrator.start().unwrap().unwrap();
    assert_eq!(report.action, SyncAction::Noop);
    assert_eq!(orchestrator.current_snapshot().unwrap().tasks.len(), 4);
}
