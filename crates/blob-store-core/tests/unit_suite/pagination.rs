//! Listing and cursor pagination tests.

use blob_store_core::{ListInput, OpContext};

use super::helpers::{all_backends, keys, put};

#[tokio::test]
async fn test_first_page_and_continuation() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        for i in (1..=5).rev() {
            put(store, &format!("a/{}", i), "x").await;
        }
        put(store, "b/1", "x").await;

        let first = store
            .list(&ctx, &ListInput::with_prefix("a/").max_keys(2))
            .await
            .unwrap();
        assert_eq!(keys(&first), vec!["a/1", "a/2"], "[{}]", store.name());
        assert!(first.is_truncated);
        assert_eq!(first.next_marker.as_deref(), Some("a/2"));

        let rest = store
            .list(&ctx, &ListInput::with_prefix("a/").start_after("a/2"))
            .await
            .unwrap();
        assert_eq!(keys(&rest), vec!["a/3", "a/4", "a/5"], "[{}]", store.name());
        assert!(!rest.is_truncated);
    }
}

#[tokio::test]
async fn test_walk_all_pages() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let ctx = OpContext::background();
        for i in 0..7 {
            put(store, &format!("logs/{:02}.log", i), "x").await;
        }

        let mut input = ListInput::with_prefix("logs/").max_keys(3);
        let mut seen = Vec::new();
        loop {
            let page = store.list(&ctx, &input).await.unwrap();
            assert!(page.objects.len() <= 3);
            seen.extend(page.objects.iter().map(|o| o.key.clone()));
            match page.next_marker {
                Some(marker) if page.is_truncated => input = input.start_after(marker),
                _ => break,
            }
        }

        let expected: Vec<String> = (0..7).map(|i| format!("logs/{:02}.log", i)).collect();
        assert_eq!(seen, expected, "[{}]", store.name());
    }
}

#[tokio::test]
async fn test_list_sizes_and_nested_keys() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        put(store, "deep/nested/dir/file.txt", "12345").await;
        put(store, "deep/top.txt", "1").await;

        let page = store
            .list(&OpContext::background(), &ListInput::with_prefix("deep/"))
            .await
            .unwrap();
        assert_eq!(keys(&page), vec!["deep/nested/dir/file.txt", "deep/top.txt"]);
        assert_eq!(page.objects[0].size, 5);
    }
}

#[tokio::test]
async fn test_empty_listing() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        let page = store
            .list(&OpContext::background(), &ListInput::with_prefix("nothing/"))
            .await
            .unwrap();
        assert!(page.objects.is_empty());
        assert!(!page.is_truncated);
        assert!(page.next_marker.is_none());
    }
}

#[tokio::test]
async fn test_non_positive_max_keys_uses_default() {
    for backend in all_backends() {
        let store = backend.store.as_ref();
        put(store, "k/1", "x").await;
        put(store, "k/2", "x").await;

        let page = store
            .list(&OpContext::background(), &ListInput::with_prefix("k/").max_keys(0))
            .await
            .unwrap();
        assert_eq!(keys(&page), vec!["k/1", "k/2"]);
    }
}
