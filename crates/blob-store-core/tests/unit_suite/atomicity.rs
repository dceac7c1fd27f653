//! Concurrent writer tests for the filesystem backend.
//!
//! Racing uploads to one key must leave exactly one complete payload and no
//! temporary files behind.

use std::sync::Arc;

use blob_store_core::storage::TEMP_FILE_PREFIX;
use blob_store_core::{FilesystemStore, OpContext, Store, UploadInput};
use tempfile::TempDir;

use super::helpers::download_string;

const WRITERS: usize = 16;

fn payload(writer: usize) -> String {
    // Distinct lengths so a truncated or mixed write cannot match any payload
    format!("{}:", writer).repeat(1000 + writer * 37)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_uploads_leave_one_complete_payload() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(FilesystemStore::new(dir.path()).unwrap());

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .upload(
                        &OpContext::background(),
                        UploadInput::from_bytes("shared/object.bin", payload(writer)),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = download_string(store.as_ref(), "shared/object.bin").await;
    let candidates: Vec<String> = (0..WRITERS).map(payload).collect();
    assert!(candidates.contains(&stored), "stored content is not one of the payloads");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("shared"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(TEMP_FILE_PREFIX))
        .collect();
    assert!(leftovers.is_empty(), "temporary files left behind: {:?}", leftovers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_writes() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(FilesystemStore::new(dir.path()).unwrap());
    let ctx = OpContext::background();

    store
        .upload(&ctx, UploadInput::from_bytes("hot.bin", payload(0)))
        .await
        .unwrap();

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for round in 1..WRITERS {
                store
                    .upload(
                        &OpContext::background(),
                        UploadInput::from_bytes("hot.bin", payload(round)),
                    )
                    .await
                    .unwrap();
            }
        })
    };

    let candidates: Vec<String> = (0..WRITERS).map(payload).collect();
    for _ in 0..WRITERS {
        let seen = download_string(store.as_ref(), "hot.bin").await;
        assert!(candidates.contains(&seen));
    }

    writer.await.unwrap();
}
