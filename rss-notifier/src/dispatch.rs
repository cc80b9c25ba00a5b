use crate::queue::{MessageQueue, OutgoingMessage};
use crate::store::NotificationStore;
use crate::types::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Timer entry point: queue one plain-text message per subscribed feed.
///
/// Sends run concurrently. The first failure is returned straight away and
/// the sends still in flight are left to finish on their own.
pub async fn dispatch_feeds(store: &dyn NotificationStore, feeds_queue: Arc<dyn MessageQueue>) -> Result<usize> {
    let feeds = store.list_feeds().await?;
    let count = feeds.len();

    let mut sends: FuturesUnordered<_> = feeds
        .into_iter()
        .map(|feed| {
            let queue = feeds_queue.clone();
            tokio::spawn(async move {
                debug!("Dispatching feed {}", feed);
                queue.send(OutgoingMessage::new(feed)).await
            })
        })
        .collect();

    while let Some(joined) = sends.next().await {
        joined??;
    }

    info!("Dispatched {} feeds to queue {}", count, feeds_queue.name());
    Ok(count)
}
