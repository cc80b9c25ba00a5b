use crate::types::{NotificationJob, RawItem, Result};
use async_trait::async_trait;

/// Fetches a feed and returns its items as parsed, before any normalization.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_items(&self, feed: &str) -> Result<Vec<RawItem>>;
}

/// Outbound email delivery. Only called once the sent marker for the job has
/// been committed.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &NotificationJob) -> Result<()>;
}
