//! Tests for cancel, restart, ignore, hide and the control socket protocol.

use super::parse;
use crate::cli::commands::queue_for_next_run;
use crate::cli::control_socket::{parse_line, send_command, ControlCommand};
use crate::cli::CliCommand;
use seedpin_core::config::JobPolicy;
use seedpin_core::drivers::{Drivers, ManifestObject, SeedManifest};
use seedpin_core::events::EventBus;
use seedpin_core::kubo::KuboClient;
use seedpin_core::store::{ObjectStatus, SeedStore};
use seedpin_core::SeedEngine;
use std::path::Path;
use std::sync::Arc;

#[test]
fn cli_parse_cancel_and_restart() {
    match parse(&["seedpin", "cancel", "2", "5"]) {
        CliCommand::Cancel { seed_id, index } => assert_eq!((seed_id, index), (2, 5)),
        _ => panic!("expected Cancel"),
    }
    match parse(&["seedpin", "restart", "2", "5"]) {
        CliCommand::Restart { seed_id, index } => assert_eq!((seed_id, index), (2, 5)),
        _ => panic!("expected Restart"),
    }
}

#[test]
fn cli_parse_ignore_and_hide() {
    match parse(&["seedpin", "ignore", "2", "5", "--undo"]) {
        CliCommand::Ignore {
            seed_id,
            index,
            undo,
        } => {
            assert_eq!((seed_id, index), (2, 5));
            assert!(undo);
        }
        _ => panic!("expected Ignore"),
    }
    match parse(&["seedpin", "hide", "2"]) {
        CliCommand::Hide { seed_id, undo } => {
            assert_eq!(seed_id, 2);
            assert!(!undo);
        }
        _ => panic!("expected Hide"),
    }
}

#[test]
fn control_lines_round_trip_through_display() {
    let cmd = ControlCommand::Reconfigure {
        seed_id: 3,
        index: 9,
    };
    assert_eq!(cmd.to_string(), "reconfigure 3 9");
    assert_eq!(parse_line(&cmd.to_string()), Some(cmd));
}

#[test]
fn control_lines_reject_garbage() {
    assert_eq!(
        parse_line("  cancel 1 2 "),
        Some(ControlCommand::Cancel {
            seed_id: 1,
            index: 2
        })
    );
    assert_eq!(parse_line("pause 1 2"), None);
    assert_eq!(parse_line("cancel 1"), None);
    assert_eq!(parse_line("cancel x 2"), None);
    assert_eq!(parse_line("cancel 1 2 3"), None);
}

#[tokio::test]
async fn send_without_listener_reports_not_running() {
    let dir = std::env::temp_dir().join(format!("seedpin-ctl-{}", std::process::id()));
    let path = dir.join("missing.sock");
    let sent = send_command(&path, ControlCommand::Cancel { seed_id: 1, index: 0 })
        .await
        .unwrap();
    assert!(!sent);
}

#[tokio::test]
async fn send_reaches_a_listener() {
    use tokio::io::AsyncBufReadExt;

    let dir = std::env::temp_dir().join(format!("seedpin-ctl-live-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("control.sock");
    let _ = std::fs::remove_file(&path);
    let listener = tokio::net::UnixListener::bind(&path).unwrap();

    let cmd = ControlCommand::Restart {
        seed_id: 4,
        index: 1,
    };
    let client = tokio::spawn({
        let path = path.clone();
        async move { send_command(&path, cmd).await.unwrap() }
    });
    let (stream, _) = listener.accept().await.unwrap();
    let mut lines = tokio::io::BufReader::new(stream).lines();
    let line = lines.next_line().await.unwrap().unwrap();
    assert_eq!(parse_line(&line), Some(cmd));
    assert!(client.await.unwrap());
    let _ = std::fs::remove_dir_all(&dir);
}

/// An engine whose node is unreachable, over a database in `dir`.
async fn offline_engine(dir: &Path) -> SeedEngine {
    let store = SeedStore::open_at(dir.join("seeds.db")).await.unwrap();
    let client = Arc::new(KuboClient::new("http://127.0.0.1:1").unwrap());
    SeedEngine::new(
        store,
        Drivers::from_backend(client),
        JobPolicy::with_download_dir(dir.join("downloads")),
        EventBus::new(16),
    )
}

#[tokio::test]
async fn offline_restart_leaves_finished_objects_alone() {
    let dir = std::env::temp_dir().join(format!("seedpin-restart-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let engine = offline_engine(&dir).await;
    let seed = engine.catalog().seed_add("QmSeed").await.unwrap();
    let manifest = SeedManifest {
        name: "seed".to_string(),
        objects: (0..2)
            .map(|i| ManifestObject {
                name: format!("object-{}.bin", i),
                path: format!("/ipfs/QmObject{}", i),
                size: None,
                date_created: 0,
            })
            .collect(),
    };
    engine.catalog().record_manifest(seed.id, &manifest).await.unwrap();
    let store = engine.catalog().store();

    let done = engine.catalog().seed_get_object(seed.id, 0).await.unwrap();
    store.mark_pinned(done.id, 5).await.unwrap();
    assert!(store.finish_object(done.id).await.unwrap());
    let before = store.get_object(seed.id, 0).await.unwrap().unwrap();
    assert!(!queue_for_next_run(&engine, seed.id, 0).await.unwrap());
    assert_eq!(store.get_object(seed.id, 0).await.unwrap().unwrap(), before);

    let stopped = engine.catalog().seed_get_object(seed.id, 1).await.unwrap();
    store
        .set_object_status(stopped.id, ObjectStatus::Cancelled)
        .await
        .unwrap();
    assert!(queue_for_next_run(&engine, seed.id, 1).await.unwrap());
    assert_eq!(
        store.get_object(seed.id, 1).await.unwrap().unwrap().status,
        ObjectStatus::Queued
    );

    // Past the manifest: refused, and no row is created.
    assert!(queue_for_next_run(&engine, seed.id, 7).await.is_err());
    assert!(store.get_object(seed.id, 7).await.unwrap().is_none());
    let _ = std::fs::remove_dir_all(&dir);
}
