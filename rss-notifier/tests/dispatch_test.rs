mod common;

use common::{init_tracing, subscribe, FailingQueue};
use rss_notifier::dispatch::dispatch_feeds;
use rss_notifier::queue::MemoryQueue;
use rss_notifier::store::memory::StoredRecord;
use rss_notifier::store::{MemoryStore, NotificationStore};
use rss_notifier::types::{NotifierError, Result};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_dispatch_one_message_per_feed() -> Result<()> {
    init_tracing();

    let store = MemoryStore::new();
    subscribe(&store, "https://a.example/rss", &["a@x", "b@x"]).await?;
    subscribe(&store, "https://b.example/rss", &["a@x"]).await?;
    subscribe(&store, "https://c.example/atom", &["c@x"]).await?;
    let queue = Arc::new(MemoryQueue::new("feeds"));

    let dispatched = dispatch_feeds(&store, queue.clone()).await?;

    assert_eq!(dispatched, 3);
    let bodies: HashSet<String> = queue.pending().await.into_iter().map(|m| m.body).collect();
    let expected: HashSet<String> = [
        "https://a.example/rss",
        "https://b.example/rss",
        "https://c.example/atom",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(bodies, expected);
    Ok(())
}

#[tokio::test]
async fn test_dispatch_without_subscriptions() -> Result<()> {
    init_tracing();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new("feeds"));

    assert_eq!(dispatch_feeds(&store, queue.clone()).await?, 0);
    assert!(queue.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_dispatch_propagates_send_failure() -> Result<()> {
    init_tracing();

    let store = MemoryStore::new();
    subscribe(&store, "https://a.example/rss", &["a@x"]).await?;
    subscribe(&store, "https://b.example/rss", &["a@x"]).await?;
    let queue = Arc::new(FailingQueue::failing_after("feeds", 0));

    let result = dispatch_feeds(&store, queue).await;
    assert!(matches!(result, Err(NotifierError::General(_))));
    Ok(())
}

#[tokio::test]
async fn test_malformed_subscription_fails_listing() -> Result<()> {
    init_tracing();

    let store = MemoryStore::new();
    subscribe(&store, "https://a.example/rss", &["a@x"]).await?;
    store
        .put_raw("feed-subscription#https://b.example/rss", "b@x", StoredRecord::default())
        .await;

    match store.list_feeds().await {
        Err(NotifierError::MalformedRecord { key, .. }) => {
            assert_eq!(key, "feed-subscription#https://b.example/rss");
        }
        other => panic!("expected malformed record, got {:?}", other),
    }

    let queue = Arc::new(MemoryQueue::new("feeds"));
    assert!(dispatch_feeds(&store, queue.clone()).await.is_err());
    assert!(queue.is_empty().await);
    Ok(())
}
