use super::{sent_marker_key, InsertOutcome, NotificationStore, RecordKind};
use crate::types::{FeedIdentity, NotifierError, PostRecord, Result, SentMarker, SubscriberRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

/// Attributes stored alongside a key. Which ones are set depends on the kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRecord {
    pub feed: Option<String>,
    pub link: Option<String>,
    pub posted: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<(String, String), StoredRecord>,
    lookup_round_trips: usize,
    largest_lookup: usize,
}

/// In-process store with the same keyspace and semantics as the PostgreSQL
/// one. Every operation takes the lock once, so the conditional insert is
/// atomic with respect to concurrent callers.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record verbatim, bypassing the typed operations.
    pub async fn put_raw(&self, pk: &str, sk: &str, record: StoredRecord) {
        let mut state = self.state.lock().await;
        state.records.insert((pk.to_owned(), sk.to_owned()), record);
    }

    pub async fn get_raw(&self, pk: &str, sk: &str) -> Option<StoredRecord> {
        let state = self.state.lock().await;
        state.records.get(&(pk.to_owned(), sk.to_owned())).cloned()
    }

    pub async fn contains_post(&self, feed: &str, id: &str) -> bool {
        self.get_raw(&RecordKind::FeedPost.partition_key(feed), id).await.is_some()
    }

    pub async fn count(&self, kind: RecordKind) -> usize {
        let state = self.state.lock().await;
        state.records.keys().filter(|(pk, _)| kind.is_key(pk)).count()
    }

    /// Number of `find_existing_posts` round trips served so far.
    pub async fn lookup_round_trips(&self) -> usize {
        self.state.lock().await.lookup_round_trips
    }

    /// Largest number of ids requested in a single round trip.
    pub async fn largest_lookup(&self) -> usize {
        self.state.lock().await.largest_lookup
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list_feeds(&self) -> Result<HashSet<FeedIdentity>> {
        let state = self.state.lock().await;
        let mut feeds = HashSet::new();

        for ((pk, _), record) in &state.records {
            if !RecordKind::FeedSubscription.is_key(pk) {
                continue;
            }
            match record.feed.as_deref() {
                Some(feed) if !feed.is_empty() => {
                    feeds.insert(feed.to_owned());
                }
                _ => {
                    return Err(NotifierError::MalformedRecord {
                        key: pk.clone(),
                        reason: "feed attribute missing from subscription".to_string(),
                    });
                }
            }
        }

        Ok(feeds)
    }

    async fn insert_subscription(&self, subscription: &SubscriberRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.records.insert(
            (
                RecordKind::FeedSubscription.partition_key(&subscription.feed),
                subscription.email.clone(),
            ),
            StoredRecord {
                feed: Some(subscription.feed.clone()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn list_subscribers(&self, feed: &str) -> Result<Vec<SubscriberRecord>> {
        let state = self.state.lock().await;
        let pk = RecordKind::FeedSubscription.partition_key(feed);

        Ok(state
            .records
            .keys()
            .filter(|(record_pk, _)| *record_pk == pk)
            .map(|(_, email)| SubscriberRecord {
                feed: feed.to_owned(),
                email: email.clone(),
            })
            .collect())
    }

    async fn find_existing_posts(&self, feed: &str, ids: &[String]) -> Result<HashSet<String>> {
        let mut state = self.state.lock().await;
        state.lookup_round_trips += 1;
        state.largest_lookup = state.largest_lookup.max(ids.len());

        let pk = RecordKind::FeedPost.partition_key(feed);
        Ok(ids
            .iter()
            .filter(|id| state.records.contains_key(&(pk.clone(), (*id).clone())))
            .cloned()
            .collect())
    }

    async fn insert_post(&self, post: &PostRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.records.insert(
            (RecordKind::FeedPost.partition_key(&post.feed), post.id.clone()),
            StoredRecord {
                feed: None,
                link: Some(post.link.clone()),
                posted: Some(post.posted),
            },
        );
        Ok(())
    }

    async fn insert_sent_marker(&self, marker: &SentMarker) -> Result<InsertOutcome> {
        let mut state = self.state.lock().await;
        let key = sent_marker_key(marker);

        if state.records.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        state.records.insert(key, StoredRecord::default());
        Ok(InsertOutcome::Inserted)
    }
}
