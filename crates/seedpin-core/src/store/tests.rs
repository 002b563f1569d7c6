//! Tests for the seed store (use in-memory DB helper from db).

use crate::store::db::open_memory;
use crate::store::{AspectStatus, ObjectStatus, SeedEntry, DEFAULT_CHUNK_SIZE};

fn entry(seed_id: i64, idx: i64, name: &str, date: i64) -> SeedEntry {
    SeedEntry {
        seed_id,
        obj_index: idx,
        name: name.to_string(),
        path: format!("/ipfs/QmObj{idx}"),
        size: Some(1024),
        date_created: date,
    }
}

#[tokio::test]
async fn seed_add_is_get_or_create() {
    let store = open_memory().await.unwrap();
    let a = store.seed_add("QmSeedA").await.unwrap();
    let again = store.seed_add("QmSeedA").await.unwrap();
    assert_eq!(a, again);
    assert_eq!(store.list_seeds(false).await.unwrap().len(), 1);

    let b = store.seed_add("QmSeedB").await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(store.list_seeds(false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn hidden_seeds_are_not_listed() {
    let store = open_memory().await.unwrap();
    let a = store.seed_add("QmSeedA").await.unwrap();
    store.seed_add("QmSeedB").await.unwrap();
    store.set_seed_hidden(a.id, true).await.unwrap();

    let visible = store.list_seeds(false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].dag_cid, "QmSeedB");
    assert_eq!(store.list_seeds(true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn object_defaults_and_no_duplicates() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();

    let obj = store.get_or_create_object(seed.id, 0).await.unwrap();
    assert!(obj.pin);
    assert!(!obj.download);
    assert!(!obj.pinned);
    assert_eq!(obj.download_chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(obj.status, ObjectStatus::Queued);
    assert_eq!(obj.pin_status, AspectStatus::Idle);

    let same = store.get_or_create_object(seed.id, 0).await.unwrap();
    assert_eq!(same.id, obj.id);
    store.configure_object(seed.id, 0, false, true).await.unwrap();
    assert_eq!(store.list_objects(seed.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn configure_keeps_achieved_state() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    let obj = store.get_or_create_object(seed.id, 3).await.unwrap();

    store.mark_pinned(obj.id, 12).await.unwrap();
    store.configure_object(seed.id, 3, false, false).await.unwrap();
    let obj = store.configure_object(seed.id, 3, true, false).await.unwrap();
    assert!(obj.pin);
    assert!(obj.pinned);
    assert_eq!(obj.pinned_nodes_final, 12);
    assert!(obj.pinned_date.is_some());
}

#[tokio::test]
async fn finish_requires_every_requested_aspect() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    let obj = store.configure_object(seed.id, 0, true, true).await.unwrap();

    assert!(!store.finish_object(obj.id).await.unwrap());
    store.mark_pinned(obj.id, 5).await.unwrap();
    assert!(!store.finish_object(obj.id).await.unwrap());
    store.mark_downloaded(obj.id, "/tmp/seedpin/a.bin").await.unwrap();
    assert!(store.finish_object(obj.id).await.unwrap());

    let obj = store.get_object(seed.id, 0).await.unwrap().unwrap();
    assert_eq!(obj.status, ObjectStatus::Finished);
    assert!(obj.is_satisfied());
}

#[tokio::test]
async fn reconfiguring_finished_object_requeues_it() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    let obj = store.get_or_create_object(seed.id, 0).await.unwrap();
    store.mark_pinned(obj.id, 1).await.unwrap();
    assert!(store.finish_object(obj.id).await.unwrap());

    let obj = store.configure_object(seed.id, 0, true, true).await.unwrap();
    assert_eq!(obj.status, ObjectStatus::Queued);

    // Dropping the download request again keeps the row queued until a job finishes it.
    let obj = store.configure_object(seed.id, 0, true, false).await.unwrap();
    assert_eq!(obj.status, ObjectStatus::Queued);
}

#[tokio::test]
async fn downloaded_to_is_unique() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    let a = store.configure_object(seed.id, 0, false, true).await.unwrap();
    let b = store.configure_object(seed.id, 1, false, true).await.unwrap();

    store.mark_downloaded(a.id, "/data/file.iso").await.unwrap();
    assert!(store.mark_downloaded(b.id, "/data/file.iso").await.is_err());
    assert!(store.mark_downloaded(b.id, "").await.is_err());

    let b = store.get_object(seed.id, 1).await.unwrap().unwrap();
    assert!(!b.downloaded);
    assert!(b.downloaded_to.is_none());
}

#[tokio::test]
async fn pin_progress_never_decreases() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    let obj = store.get_or_create_object(seed.id, 0).await.unwrap();

    store.update_pin_progress(obj.id, 30).await.unwrap();
    store.update_pin_progress(obj.id, 10).await.unwrap();
    let obj = store.get_object(seed.id, 0).await.unwrap().unwrap();
    assert_eq!(obj.pinned_nodes_cur, 30);
}

#[tokio::test]
async fn cancel_and_recover_reset_in_progress_aspects() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    let a = store.get_or_create_object(seed.id, 0).await.unwrap();
    let b = store.get_or_create_object(seed.id, 1).await.unwrap();

    store.set_pin_status(a.id, AspectStatus::InProgress).await.unwrap();
    store.record_cancelled(a.id).await.unwrap();
    let a = store.get_object(seed.id, 0).await.unwrap().unwrap();
    assert_eq!(a.status, ObjectStatus::Cancelled);
    assert_eq!(a.pin_status, AspectStatus::Idle);

    store.set_download_status(b.id, AspectStatus::InProgress).await.unwrap();
    assert_eq!(store.recover_interrupted().await.unwrap(), 1);
    let b = store.get_object(seed.id, 1).await.unwrap().unwrap();
    assert_eq!(b.download_status, AspectStatus::Idle);
}

#[tokio::test]
async fn seed_delete_cascades() {
    let store = open_memory().await.unwrap();
    let seed = store.seed_add("QmSeed").await.unwrap();
    store.get_or_create_object(seed.id, 0).await.unwrap();
    store
        .record_entries(seed.id, &[entry(seed.id, 0, "a.txt", 100)])
        .await
        .unwrap();

    assert!(store.seed_delete("QmSeed").await.unwrap());
    assert!(!store.seed_delete("QmSeed").await.unwrap());
    assert!(store.seed_by_id(seed.id).await.unwrap().is_none());
    assert!(store.list_objects(seed.id).await.unwrap().is_empty());
    assert!(store.list_entries(seed.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn entries_window_skips_hidden_seeds() {
    let store = open_memory().await.unwrap();
    let a = store.seed_add("QmA").await.unwrap();
    let b = store.seed_add("QmB").await.unwrap();
    store
        .record_entries(
            a.id,
            &[entry(a.id, 0, "old.iso", 100), entry(a.id, 1, "new.iso", 500)],
        )
        .await
        .unwrap();
    store
        .record_entries(b.id, &[entry(b.id, 0, "hidden.iso", 500)])
        .await
        .unwrap();
    store.set_seed_hidden(b.id, true).await.unwrap();

    let hits = store.entries_in_window(200, 1000).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "new.iso");
    assert_eq!(hits[0].dag_cid, "QmA");
}
