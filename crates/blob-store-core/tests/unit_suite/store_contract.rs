//! Store contract tests.
//!
//! Behaviour every backend must share:
//! - Upload then read back, through both `download` and `get_object`
//! - Metadata from `head_object`
//! - Delete semantics, including absent keys and batches
//! - Key validation before any I/O
//! - Copy and existence checks

use std::time::Duration;

use blob_store_core::{Error, ErrorKind, ListInput, OpContext, Store, UploadInput};

use super::helpers::{all_backends, download_string, put, read_string, signing_store};

#[tokio::test]
async fn test_upload_then_read_back() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        put(store, "docs/readme.txt", "hello world").await;

        assert_eq!(download_string(store, "docs/readme.txt").await, "hello world");
        assert_eq!(read_string(store, "docs/readme.txt").await, "hello world");
    }
}

#[tokio::test]
async fn test_upload_replaces_existing_object() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        put(store, "a.txt", "a much longer first version").await;
        put(store, "a.txt", "short").await;

        assert_eq!(download_string(store, "a.txt").await, "short", "[{}]", store.name());
    }
}

#[tokio::test]
async fn test_upload_output() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let output = store
            .upload(&OpContext::background(), UploadInput::from_bytes("img/logo.png", "png"))
            .await
            .unwrap();

        assert!(output.location.ends_with("img/logo.png"), "[{}] {}", store.name(), output.location);
        assert!(!output.etag.is_empty());
        assert!(!output.etag.starts_with('"'));
    }
}

#[tokio::test]
async fn test_head_object() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        put(store, "photos/cat.png", "0123456789").await;

        let info = store
            .head_object(&OpContext::background(), "photos/cat.png")
            .await
            .unwrap();
        assert_eq!(info.key, "photos/cat.png");
        assert_eq!(info.size, 10);
        assert_eq!(info.content_type, "image/png", "[{}]", store.name());
        assert!(info.last_modified.is_some());
    }
}

#[tokio::test]
async fn test_explicit_content_type_is_kept_by_network_store() {
    let backend = super::helpers::TestStore::memory();
    let store = backend.store.as_ref();
    let ctx = OpContext::background();

    store
        .upload(
            &ctx,
            UploadInput::from_bytes("data.bin", "{}")
                .with_content_type("application/json")
                .with_metadata("owner", "media"),
        )
        .await
        .unwrap();

    let info = store.head_object(&ctx, "data.bin").await.unwrap();
    assert_eq!(info.content_type, "application/json");
    assert_eq!(info.metadata.get("owner").map(String::as_str), Some("media"));
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();

        let err = store.head_object(&ctx, "nope.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "[{}] {}", store.name(), err);

        assert!(store.get_object(&ctx, "nope.txt").await.err().unwrap().is_not_found());

        let mut sink = std::io::Cursor::new(Vec::new());
        assert!(store.download(&ctx, "nope.txt", &mut sink).await.unwrap_err().is_not_found());
        assert!(sink.get_ref().is_empty());
    }
}

#[tokio::test]
async fn test_exists() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        put(store, "present.txt", "x").await;

        assert!(store.exists(&ctx, "present.txt").await.unwrap());
        assert!(!store.exists(&ctx, "absent.txt").await.unwrap());
    }
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        put(store, "gone.txt", "x").await;

        store.delete(&ctx, "gone.txt").await.unwrap();
        assert!(!store.exists(&ctx, "gone.txt").await.unwrap());

        // Deleting again still succeeds
        store.delete(&ctx, "gone.txt").await.unwrap();
    }
}

#[tokio::test]
async fn test_delete_multiple() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        put(store, "batch/1", "1").await;
        put(store, "batch/2", "2").await;

        let keys = vec![
            "batch/1".to_string(),
            "batch/2".to_string(),
            "batch/never-existed".to_string(),
        ];
        let output = store.delete_multiple(&ctx, &keys).await;
        assert!(output.is_success(), "[{}] {:?}", store.name(), output);

        assert!(!store.exists(&ctx, "batch/1").await.unwrap());
        assert!(!store.exists(&ctx, "batch/2").await.unwrap());
    }
}

#[tokio::test]
async fn test_delete_multiple_rejects_invalid_keys_up_front() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        put(store, "keep.txt", "x").await;

        let keys = vec!["keep.txt".to_string(), "../escape".to_string()];
        let output = store.delete_multiple(&ctx, &keys).await;

        let err = output.error.expect("batch with an invalid key must fail");
        assert_eq!(err.kind(), ErrorKind::InvalidKey, "[{}]", store.name());
        assert!(store.exists(&ctx, "keep.txt").await.unwrap());
    }
}

const INVALID_KEYS: [&str; 5] = ["", "/etc/passwd", "../outside", "a/../../b", "x/../../../y"];

#[tokio::test]
async fn test_invalid_keys_rejected_by_every_operation() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        put(store, "valid.txt", "x").await;

        for key in INVALID_KEYS {
            let name = store.name();
            let check = |op: &str, err: Error| {
                assert_eq!(err.kind(), ErrorKind::InvalidKey, "[{}] {} {:?}: {}", name, op, key, err);
            };

            check(
                "upload",
                store
                    .upload(&ctx, UploadInput::from_bytes(key, "x"))
                    .await
                    .unwrap_err(),
            );

            let mut sink = std::io::Cursor::new(Vec::new());
            check("download", store.download(&ctx, key, &mut sink).await.unwrap_err());
            assert!(sink.get_ref().is_empty());

            check("get_object", store.get_object(&ctx, key).await.err().unwrap());
            check("head_object", store.head_object(&ctx, key).await.unwrap_err());
            check("delete", store.delete(&ctx, key).await.unwrap_err());
            check("exists", store.exists(&ctx, key).await.unwrap_err());
            check("copy source", store.copy(&ctx, key, "dest.txt").await.unwrap_err());
            check("copy dest", store.copy(&ctx, "valid.txt", key).await.unwrap_err());

            let output = store.delete_multiple(&ctx, &[key.to_string()]).await;
            check("delete_multiple", output.error.expect("batch must fail"));
        }

        // Nothing was written or removed along the way
        let page = store.list(&ctx, &ListInput::default()).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["valid.txt"], "[{}]", store.name());
    }
}

#[tokio::test]
async fn test_invalid_keys_rejected_by_presigner() {
    let store = signing_store();
    let presigner = store.presigner().expect("static credentials can sign");
    let ctx = OpContext::background();
    let expiration = Duration::from_secs(60);

    for key in INVALID_KEYS {
        let err = presigner
            .generate_presigned_url(&ctx, key, expiration)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey, "get {:?}", key);

        let err = presigner
            .generate_presigned_upload_url(&ctx, key, Some("text/plain"), expiration)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey, "put {:?}", key);
    }
}

#[tokio::test]
async fn test_copy() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        put(store, "src/original.txt", "payload").await;

        store
            .copy(&ctx, "src/original.txt", "dst/nested/copy.txt")
            .await
            .unwrap();

        assert_eq!(download_string(store, "dst/nested/copy.txt").await, "payload");
        assert_eq!(download_string(store, "src/original.txt").await, "payload");
    }
}

#[tokio::test]
async fn test_copy_missing_source() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let err = store
            .copy(&OpContext::background(), "missing.txt", "dest.txt")
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "[{}] {}", store.name(), err);
    }
}

#[tokio::test]
async fn test_cancelled_context_fails_before_io() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        ctx.cancel();

        let err = store
            .upload(&ctx, UploadInput::from_bytes("never.txt", "x"))
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "[{}] {}", store.name(), err);

        assert!(!store
            .exists(&OpContext::background(), "never.txt")
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn test_no_presigner_without_signer() {
    for backend in all_backends() {
        assert!(backend.store.presigner().is_none());
    }
}
