use crate::batching::batch;
use crate::ids::derive_id;
use crate::normalizer::normalize;
use crate::queue::{single_message, MessageQueue, OutgoingMessage, QueueMessage, SEND_BATCH_SIZE};
use crate::store::NotificationStore;
use crate::traits::FeedSource;
use crate::types::{NotificationJob, NotifierError, PostRecord, Result, SubscriberRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters for one feed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub fetched: usize,
    pub candidates: usize,
    pub new_posts: usize,
    pub subscribers: usize,
    pub jobs_enqueued: usize,
}

/// Turns one feed's new posts into one queued notification per subscriber.
///
/// A post is recorded as seen only after all of its jobs are queued, so a
/// failure part way through leaves it to be picked up on the next trigger.
/// Duplicate jobs from such a retry collapse on their dedup id.
pub struct FanoutPipeline {
    store: Arc<dyn NotificationStore>,
    source: Arc<dyn FeedSource>,
    notifications: Arc<dyn MessageQueue>,
}

impl FanoutPipeline {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        source: Arc<dyn FeedSource>,
        notifications: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            store,
            source,
            notifications,
        }
    }

    /// Feed queue entry point. The message body is the feed URL.
    pub async fn handle_messages(&self, messages: &[QueueMessage]) -> Result<Option<FeedReport>> {
        match single_message(messages)? {
            Some(message) => self.process_feed(&message.body).await.map(Some),
            None => {
                debug!("No feed message to process");
                Ok(None)
            }
        }
    }

    pub async fn process_feed(&self, feed: &str) -> Result<FeedReport> {
        let mut report = FeedReport::default();

        let raw_items = self
            .source
            .fetch_items(feed)
            .await
            .map_err(|e| NotifierError::FeedFetch {
                feed: feed.to_owned(),
                source: Box::new(e),
            })?;
        report.fetched = raw_items.len();

        let candidates = normalize(feed, raw_items);
        report.candidates = candidates.len();

        let new_posts = self.store.filter_new_posts(feed, candidates).await?;
        report.new_posts = new_posts.len();
        if new_posts.is_empty() {
            info!("Feed {}: nothing new in {} items", feed, report.fetched);
            return Ok(report);
        }

        let subscribers = self.store.list_subscribers(feed).await?;
        report.subscribers = subscribers.len();

        for post in &new_posts {
            report.jobs_enqueued += self.fan_out_post(post, &subscribers).await?;
        }

        info!(
            "Feed {}: fetched {}, {} valid, {} new, {} subscribers, {} jobs enqueued",
            feed, report.fetched, report.candidates, report.new_posts, report.subscribers, report.jobs_enqueued
        );
        Ok(report)
    }

    async fn fan_out_post(&self, post: &PostRecord, subscribers: &[SubscriberRecord]) -> Result<usize> {
        let messages = expand_jobs(post, subscribers)?;

        for chunk in batch(&messages, SEND_BATCH_SIZE) {
            self.notifications
                .send_batch(chunk.to_vec())
                .await
                .map_err(|e| NotifierError::Enqueue {
                    feed: post.feed.clone(),
                    post_id: post.id.clone(),
                    source: Box::new(e),
                })?;
        }

        self.store.insert_post(post).await?;
        debug!("Post {} of {} queued for {} subscribers", post.id, post.feed, messages.len());
        Ok(messages.len())
    }
}

/// One queue message per subscriber of `post`, keyed for dedup by the job's
/// derived identifier.
pub fn expand_jobs(post: &PostRecord, subscribers: &[SubscriberRecord]) -> Result<Vec<OutgoingMessage>> {
    subscribers
        .iter()
        .map(|subscriber| {
            let job = NotificationJob::for_subscriber(post, &subscriber.email);
            let body = serde_json::to_string(&job)?;
            Ok(OutgoingMessage::new(body).with_dedup_id(derive_id(&job.logical_key())))
        })
        .collect()
}
