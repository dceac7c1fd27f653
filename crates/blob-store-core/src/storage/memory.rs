//! In-memory storage backend for testing.

use object_store::memory::InMemory;
use std::sync::Arc;

use super::network::NetworkStore;

impl NetworkStore {
    /// Networked store backed by `object_store`'s in-memory implementation.
    ///
    /// Goes through the same upload, download and listing paths as S3, so it
    /// doubles as a test double for the networked backend. Nothing persists
    /// between runs and presigned URLs are unavailable.
    pub fn in_memory() -> Self {
        Self::new("memory", Arc::new(InMemory::new()), "memory://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpContext;
    use crate::storage::{ListInput, Store, UploadInput};

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = NetworkStore::in_memory();
        let ctx = OpContext::background();

        store
            .upload(&ctx, UploadInput::from_bytes("test/key", "Hello, Memory!"))
            .await
            .unwrap();
        assert!(store.exists(&ctx, "test/key").await.unwrap());

        let mut sink = std::io::Cursor::new(Vec::new());
        store.download(&ctx, "test/key", &mut sink).await.unwrap();
        assert_eq!(sink.into_inner(), b"Hello, Memory!");

        store.delete(&ctx, "test/key").await.unwrap();
        assert!(!store.exists(&ctx, "test/key").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_copy() {
        let store = NetworkStore::in_memory();
        let ctx = OpContext::background();

        store
            .upload(&ctx, UploadInput::from_bytes("src.json", "{}"))
            .await
            .unwrap();
        store.copy(&ctx, "src.json", "dst.json").await.unwrap();

        let page = store.list(&ctx, &ListInput::default()).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["dst.json", "src.json"]);
        assert_eq!(store.name(), "memory");
    }
}
