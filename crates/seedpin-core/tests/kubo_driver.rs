//! Integration test: Kubo RPC driver against a local fake node.

mod common;

use common::kubo_server::{self, KuboFixture};
use seedpin_core::drivers::{
    DownloadDriver, DownloadEvent, Drivers, ManifestSource, PinDriver, PinEvent, ProviderLookup,
    StatDriver,
};
use seedpin_core::events::EventBus;
use seedpin_core::kubo::KuboClient;
use seedpin_core::store::{ObjectStatus, SeedStore};
use seedpin_core::SeedEngine;
use std::sync::Arc;
use tempfile::tempdir;

const CID: &str = "QmFileObject";
const MANIFEST_CID: &str = "bafyManifest";
const ALIAS: &str = "/ipfs/QmRoot/notes.txt";

fn fixture() -> KuboFixture {
    KuboFixture {
        cid: CID.to_string(),
        alias: ALIAS.to_string(),
        content: b"hello from kubo, twenty-nine!".to_vec(),
        pin_progress: vec![1, 3, 7],
        providers: vec!["12D3KooA".to_string(), "12D3KooB".to_string()],
        manifest_cid: MANIFEST_CID.to_string(),
        manifest_json: format!(
            r#"{{"name":"notes","objects":[{{"name":"notes.txt","path":"/ipfs/{}","size":29,"dateCreated":1700000000}}]}}"#,
            CID
        ),
    }
}

fn client() -> KuboClient {
    KuboClient::new(&kubo_server::start(fixture())).unwrap()
}

#[tokio::test]
async fn stat_reports_size_and_errors() {
    let client = client();
    let stat = client.stat(&format!("/ipfs/{}", CID)).await.unwrap();
    assert_eq!(stat.hash, CID);
    assert_eq!(stat.size, 29);
    assert_eq!(stat.cumulative_size, 40);

    let err = client.stat("/ipfs/QmMissing").await.unwrap_err();
    assert!(format!("{:#}", err).contains("merkledag: not found"));
}

#[tokio::test]
async fn pin_streams_progress_then_done() {
    let client = client();
    let mut stream = client.pin(CID).await.unwrap();
    let mut events = Vec::new();
    while let Some(e) = stream.next().await {
        events.push(e);
    }
    assert_eq!(
        events,
        vec![
            PinEvent::Progress { nodes: 1 },
            PinEvent::Progress { nodes: 3 },
            PinEvent::Progress { nodes: 7 },
            PinEvent::Done,
        ]
    );
}

#[tokio::test]
async fn pin_of_unknown_object_fails() {
    let client = client();
    let mut stream = client.pin("/ipfs/QmMissing").await.unwrap();
    let mut last = None;
    while let Some(e) = stream.next().await {
        last = Some(e);
    }
    assert_eq!(last, Some(PinEvent::Failed("merkledag: not found".to_string())));
}

#[tokio::test]
async fn download_lands_under_hash_name() {
    let client = client();
    let dir = tempdir().unwrap();
    let mut stream = client
        .get(&format!("/ipfs/{}", CID), dir.path(), 8)
        .await
        .unwrap();
    let mut last_read = 0;
    let mut done = None;
    while let Some(e) = stream.next().await {
        match e {
            DownloadEvent::Progress { bytes_read, content_length } => {
                assert!(bytes_read >= last_read);
                assert_eq!(content_length, 29);
                last_read = bytes_read;
            }
            DownloadEvent::Done { bytes_read, path, .. } => {
                assert_eq!(bytes_read, 29);
                done = Some(path);
            }
            DownloadEvent::Failed(msg) => panic!("download failed: {}", msg),
        }
    }
    let path = done.expect("download should complete");
    assert_eq!(path, dir.path().join(".landing").join(CID));
    assert_eq!(std::fs::read(&path).unwrap(), b"hello from kubo, twenty-nine!");
    assert!(!dir.path().join(".landing").join(format!("{}.part", CID)).exists());
}

#[tokio::test]
async fn subpath_download_lands_under_its_hash() {
    let client = client();
    let dir = tempdir().unwrap();
    // A sibling already placed under the subpath's last segment.
    std::fs::write(dir.path().join("notes.txt"), b"placed earlier").unwrap();

    let mut stream = client.get(ALIAS, dir.path(), 8).await.unwrap();
    let mut done = None;
    while let Some(e) = stream.next().await {
        match e {
            DownloadEvent::Done { path, .. } => done = Some(path),
            DownloadEvent::Failed(msg) => panic!("download failed: {}", msg),
            DownloadEvent::Progress { .. } => {}
        }
    }
    assert_eq!(done, Some(dir.path().join(".landing").join(CID)));
    assert_eq!(std::fs::read(dir.path().join("notes.txt")).unwrap(), b"placed earlier");
}

#[tokio::test]
async fn providers_and_manifest() {
    let client = client();
    assert_eq!(client.find_providers(&format!("/ipfs/{}", CID), 20).await.unwrap(), 2);
    assert_eq!(client.find_providers(CID, 1).await.unwrap(), 1);

    let manifest = client.load(MANIFEST_CID).await.unwrap();
    assert_eq!(manifest.name, "notes");
    assert_eq!(manifest.objects.len(), 1);
    assert_eq!(manifest.objects[0].name, "notes.txt");
    assert_eq!(manifest.objects[0].date_created, 1_700_000_000);
    assert!(client.load("bafyMissing").await.is_err());
}

#[tokio::test]
async fn engine_pins_and_downloads_through_kubo() {
    let client = Arc::new(client());
    let state = tempdir().unwrap();
    let downloads = tempdir().unwrap();
    let store = SeedStore::open_at(state.path().join("seeds.db")).await.unwrap();
    let policy = common::fake_drivers::fast_policy(downloads.path());
    let engine = SeedEngine::new(
        store,
        Drivers::from_backend(client),
        policy,
        EventBus::default(),
    );

    let seed = engine.add_seed(MANIFEST_CID).await.unwrap();
    engine.configure_object(seed.id, 0, true, true).await.unwrap();
    engine.start_seed(seed.id).await.unwrap();
    engine.wait_idle().await;

    let objects = engine.seed_objects(seed.id).await.unwrap();
    assert_eq!(objects.len(), 1);
    let obj = &objects[0];
    assert_eq!(obj.status, ObjectStatus::Finished);
    assert!(obj.pinned);
    assert_eq!(obj.pinned_nodes_final, 7);
    let placed = downloads.path().join(MANIFEST_CID).join("notes.txt");
    assert_eq!(obj.downloaded_to.as_deref(), Some(placed.to_str().unwrap()));
    assert_eq!(std::fs::read(&placed).unwrap(), b"hello from kubo, twenty-nine!");
}
