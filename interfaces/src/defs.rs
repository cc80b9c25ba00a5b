use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed is identified by its canonical URL.
pub type FeedIdentity = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub feed: FeedIdentity,
    pub email: String,
}

/// A post that survived normalization. Once persisted it marks the post as
/// processed for its feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub feed: FeedIdentity,
    /// The feed-supplied GUID, or the link when the feed has none.
    pub id: String,
    pub link: String,
    /// Publish time from the feed, or the time the post was first seen.
    pub posted: DateTime<Utc>,
}

/// An item as returned by fetching and parsing a feed. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub guid: String,
    pub link: String,
    pub links: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

/// One email to send: a new post crossed with one subscriber of its feed.
/// Only ever exists as a queue message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub feed: FeedIdentity,
    pub id: String,
    pub email: String,
    pub link: String,
    pub posted: DateTime<Utc>,
}

impl NotificationJob {
    pub fn for_subscriber(post: &PostRecord, email: &str) -> Self {
        Self {
            feed: post.feed.clone(),
            id: post.id.clone(),
            email: email.to_owned(),
            link: post.link.clone(),
            posted: post.posted,
        }
    }

    /// `feed#post#email`, the key job identifiers are derived from.
    pub fn logical_key(&self) -> String {
        format!("{}#{}#{}", self.feed, self.id, self.email)
    }
}

/// Existence of this record means the email for (feed, post, subscriber) has
/// been committed. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentMarker {
    pub feed: FeedIdentity,
    pub post_id: String,
    pub email: String,
}

impl From<&NotificationJob> for SentMarker {
    fn from(job: &NotificationJob) -> Self {
        Self {
            feed: job.feed.clone(),
            post_id: job.id.clone(),
            email: job.email.clone(),
        }
    }
}
