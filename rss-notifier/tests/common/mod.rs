#![allow(dead_code)]

use async_trait::async_trait;
use rss_notifier::queue::{MemoryQueue, MessageQueue, OutgoingMessage, QueueMessage};
use rss_notifier::store::{MemoryStore, NotificationStore};
use rss_notifier::traits::{FeedSource, Mailer};
use rss_notifier::types::{NotificationJob, NotifierError, RawItem, Result, SubscriberRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

pub fn item(guid: &str, link: &str) -> RawItem {
    RawItem {
        guid: guid.to_owned(),
        link: link.to_owned(),
        ..Default::default()
    }
}

pub async fn subscribe(store: &MemoryStore, feed: &str, emails: &[&str]) -> Result<()> {
    for email in emails {
        store
            .insert_subscription(&SubscriberRecord {
                feed: feed.to_owned(),
                email: email.to_string(),
            })
            .await?;
    }
    Ok(())
}

pub async fn queued_jobs(queue: &MemoryQueue) -> Vec<NotificationJob> {
    queue
        .pending()
        .await
        .iter()
        .map(|message| serde_json::from_str(&message.body).expect("job body is JSON"))
        .collect()
}

/// Feed source answering from a fixed script instead of the network.
#[derive(Default)]
pub struct StaticFeedSource {
    feeds: Mutex<HashMap<String, Vec<RawItem>>>,
    fetches: AtomicUsize,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, feed: &str, items: Vec<RawItem>) -> Self {
        self.set_feed(feed, items);
        self
    }

    pub fn set_feed(&self, feed: &str, items: Vec<RawItem>) {
        self.feeds.lock().unwrap().insert(feed.to_owned(), items);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch_items(&self, feed: &str) -> Result<Vec<RawItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.feeds
            .lock()
            .unwrap()
            .get(feed)
            .cloned()
            .ok_or_else(|| NotifierError::HttpStatus {
                url: feed.to_owned(),
                status: 404,
            })
    }
}

/// Memory queue that starts rejecting batches after a set number of sends,
/// or fails a set number of deletes.
pub struct FailingQueue {
    pub inner: MemoryQueue,
    accepted_batches: usize,
    sent_batches: AtomicUsize,
    delete_failures: AtomicUsize,
}

impl FailingQueue {
    pub fn failing_after(name: &str, accepted_batches: usize) -> Self {
        Self {
            inner: MemoryQueue::new(name),
            accepted_batches,
            sent_batches: AtomicUsize::new(0),
            delete_failures: AtomicUsize::new(0),
        }
    }

    pub fn failing_deletes(name: &str, failures: usize) -> Self {
        Self {
            inner: MemoryQueue::new(name),
            accepted_batches: usize::MAX,
            sent_batches: AtomicUsize::new(0),
            delete_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl MessageQueue for FailingQueue {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send_batch(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
        if self.sent_batches.fetch_add(1, Ordering::SeqCst) >= self.accepted_batches {
            return Err(NotifierError::General(format!("queue {} unavailable", self.name())));
        }
        self.inner.send_batch(messages).await
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        self.inner.receive(max).await
    }

    async fn delete(&self, message_id: Uuid) -> Result<()> {
        let remaining = self.delete_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.delete_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(NotifierError::General(format!("queue {} unavailable", self.name())));
        }
        self.inner.delete(message_id).await
    }
}

/// Mailer that keeps every job it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<NotificationJob>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<NotificationJob> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, job: &NotificationJob) -> Result<()> {
        self.sent.lock().unwrap().push(job.clone());
        if self.fail {
            return Err(NotifierError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}
