//! Durable records behind the notification pipeline.
//!
//! Every record lives in one shared keyspace keyed by `(pk, sk)`. The
//! partition key is prefixed with the record kind so subscriptions, posts and
//! sent markers never collide:
//!
//! - subscription: `feed-subscription#<feed>` / `<email>`
//! - post:         `feed-post#<feed>` / `<post id>`
//! - sent marker:  `email-sent#<feed>#<post id>` / `<email>`

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::batching::batch;
use crate::types::{FeedIdentity, PostRecord, Result, SentMarker, SubscriberRecord};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Most post ids looked up in a single round trip.
pub const POST_LOOKUP_BATCH_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    FeedSubscription,
    FeedPost,
    EmailSent,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::FeedSubscription => "feed-subscription",
            RecordKind::FeedPost => "feed-post",
            RecordKind::EmailSent => "email-sent",
        }
    }

    pub fn partition_key(&self, scope: &str) -> String {
        format!("{}#{}", self.as_str(), scope)
    }

    pub fn is_key(&self, key: &str) -> bool {
        key.strip_prefix(self.as_str())
            .is_some_and(|rest| rest.starts_with('#'))
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition and sort key of a sent marker.
pub fn sent_marker_key(marker: &SentMarker) -> (String, String) {
    (
        RecordKind::EmailSent.partition_key(&format!("{}#{}", marker.feed, marker.post_id)),
        marker.email.clone(),
    )
}

/// Result of a conditional insert. A duplicate is an outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Everything the pipeline reads and writes. No operation retries; callers
/// re-run the whole step instead, so every write must be safe to repeat.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Distinct feeds with at least one subscriber. A subscription record
    /// without a usable `feed` attribute is an error.
    async fn list_feeds(&self) -> Result<HashSet<FeedIdentity>>;

    async fn insert_subscription(&self, subscription: &SubscriberRecord) -> Result<()>;

    async fn list_subscribers(&self, feed: &str) -> Result<Vec<SubscriberRecord>>;

    /// Ids among `ids` already recorded for `feed`. One round trip; callers
    /// keep `ids` within [`POST_LOOKUP_BATCH_SIZE`].
    async fn find_existing_posts(&self, feed: &str, ids: &[String]) -> Result<HashSet<String>>;

    /// Keep only the candidates not yet recorded for `feed`, in input order.
    async fn filter_new_posts(&self, feed: &str, candidates: Vec<PostRecord>) -> Result<Vec<PostRecord>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = candidates.iter().map(|post| post.id.clone()).collect();
        let mut existing = HashSet::with_capacity(ids.len());
        for chunk in batch(&ids, POST_LOOKUP_BATCH_SIZE) {
            existing.extend(self.find_existing_posts(feed, chunk).await?);
        }

        let total = candidates.len();
        let new_posts: Vec<PostRecord> = candidates
            .into_iter()
            .filter(|post| !existing.contains(&post.id))
            .collect();
        debug!("{} of {} posts in {} are new", new_posts.len(), total, feed);
        Ok(new_posts)
    }

    /// Mark a post as processed. Unconditional upsert.
    async fn insert_post(&self, post: &PostRecord) -> Result<()>;

    /// Atomically create the sent marker unless it already exists.
    async fn insert_sent_marker(&self, marker: &SentMarker) -> Result<InsertOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kinds_namespace_keys() {
        let pk = RecordKind::FeedPost.partition_key("https://example.com/feed");
        assert_eq!(pk, "feed-post#https://example.com/feed");
        assert!(RecordKind::FeedPost.is_key(&pk));
        assert!(!RecordKind::FeedSubscription.is_key(&pk));
        assert!(!RecordKind::FeedPost.is_key("feed-postscript#x"));
    }

    #[test]
    fn sent_marker_keys() {
        let marker = SentMarker {
            feed: "F".to_owned(),
            post_id: "p1".to_owned(),
            email: "a@x".to_owned(),
        };
        assert_eq!(
            sent_marker_key(&marker),
            ("email-sent#F#p1".to_owned(), "a@x".to_owned())
        );
    }
}
