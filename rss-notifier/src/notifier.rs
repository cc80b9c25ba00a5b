use crate::commit::{CommitHandler, CommitOutcome};
use crate::config::NotifierConfig;
use crate::dispatch::dispatch_feeds;
use crate::mailer::LogMailer;
use crate::pipeline::{FanoutPipeline, FeedReport};
use crate::queue::{MessageQueue, PgQueue, QueueMessage};
use crate::sources::HttpFeedSource;
use crate::store::{NotificationStore, PostgresStore};
use crate::traits::{FeedSource, Mailer};
use crate::types::{NotifierError, Result, SubscriberRecord};
use sqlx::postgres::PgPoolOptions;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Everything the handlers talk to.
pub struct Backends {
    pub store: Arc<dyn NotificationStore>,
    pub feeds: Arc<dyn MessageQueue>,
    pub notifications: Arc<dyn MessageQueue>,
    pub source: Arc<dyn FeedSource>,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub receive_batch_size: usize,
    pub invocation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            receive_batch_size: 1,
            invocation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl From<&NotifierConfig> for WorkerSettings {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            receive_batch_size: config.receive_batch_size,
            invocation_timeout: config.invocation_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Worker {
    Feed,
    Delivery,
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Worker::Feed => f.write_str("feed"),
            Worker::Delivery => f.write_str("delivery"),
        }
    }
}

struct Schema {
    store: Arc<PostgresStore>,
    queue: Arc<PgQueue>,
}

/// Wires the store, queues, feed source and mailer into the three handlers
/// and runs them as timer or queue workers.
pub struct RssNotifier {
    store: Arc<dyn NotificationStore>,
    feeds: Arc<dyn MessageQueue>,
    notifications: Arc<dyn MessageQueue>,
    pipeline: FanoutPipeline,
    committer: CommitHandler,
    settings: WorkerSettings,
    schema: Option<Schema>,
}

impl RssNotifier {
    pub fn new(backends: Backends, settings: WorkerSettings) -> Self {
        let pipeline = FanoutPipeline::new(
            backends.store.clone(),
            backends.source,
            backends.notifications.clone(),
        );
        let committer = CommitHandler::new(backends.store.clone(), backends.mailer);

        Self {
            store: backends.store,
            feeds: backends.feeds,
            notifications: backends.notifications,
            pipeline,
            committer,
            settings,
            schema: None,
        }
    }

    /// Connect to PostgreSQL and build the production wiring: HTTP feeds and
    /// the logging mailer.
    pub async fn connect(config: &NotifierConfig) -> Result<Self> {
        config.validate()?;

        let redacted = redact_database_url(&config.database_url);
        info!("Connecting to database: {}", redacted);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|source| NotifierError::Store {
                operation: "connect",
                scope: redacted,
                source,
            })?;

        let store = Arc::new(PostgresStore::new(pool.clone(), &config.records_table));
        let feeds = Arc::new(PgQueue::new(
            pool.clone(),
            &config.queue_table,
            &config.feed_queue,
            config.visibility_timeout(),
        ));
        let notifications = Arc::new(PgQueue::new(
            pool,
            &config.queue_table,
            &config.notification_queue,
            config.visibility_timeout(),
        ));

        let backends = Backends {
            store: store.clone(),
            feeds: feeds.clone(),
            notifications,
            source: Arc::new(HttpFeedSource::new(config.fetch_config())?),
            mailer: Arc::new(LogMailer),
        };

        let mut notifier = Self::new(backends, WorkerSettings::from(config));
        notifier.schema = Some(Schema { store, queue: feeds });
        Ok(notifier)
    }

    /// Create the record and queue tables. In-memory wiring has nothing to set up.
    pub async fn setup(&self) -> Result<()> {
        match &self.schema {
            Some(schema) => {
                schema.store.setup_schema().await?;
                schema.queue.setup_schema().await
            }
            None => {
                debug!("No schema to set up");
                Ok(())
            }
        }
    }

    pub async fn subscribe(&self, feed: &str, email: &str) -> Result<()> {
        // Stored as given; the URL string itself is the feed identity.
        Url::parse(feed)?;
        if !email.contains('@') {
            return Err(NotifierError::General(format!("Not an email address: {}", email)));
        }

        self.store
            .insert_subscription(&SubscriberRecord {
                feed: feed.to_owned(),
                email: email.to_owned(),
            })
            .await
    }

    /// Timer invocation: queue every subscribed feed for processing.
    pub async fn tick(&self) -> Result<usize> {
        with_deadline(
            self.settings.invocation_timeout,
            dispatch_feeds(self.store.as_ref(), self.feeds.clone()),
        )
        .await
    }

    /// Consume the feed queue. With `once`, return as soon as it is empty.
    /// Returns the number of messages handled successfully.
    pub async fn run_feed_worker(&self, once: bool) -> Result<usize> {
        self.run_worker(Worker::Feed, once).await
    }

    /// Consume the notification queue. With `once`, return as soon as it is empty.
    pub async fn run_delivery_worker(&self, once: bool) -> Result<usize> {
        self.run_worker(Worker::Delivery, once).await
    }

    async fn run_worker(&self, worker: Worker, once: bool) -> Result<usize> {
        let queue = match worker {
            Worker::Feed => &self.feeds,
            Worker::Delivery => &self.notifications,
        };
        info!("Starting {} worker on queue {}", worker, queue.name());

        let mut handled = 0;
        loop {
            let messages = match queue.receive(self.settings.receive_batch_size).await {
                Ok(messages) => messages,
                Err(e) if once => return Err(e),
                Err(e) => {
                    error!("{} worker failed to receive from {}: {}", worker, queue.name(), e);
                    tokio::time::sleep(self.settings.poll_interval).await;
                    continue;
                }
            };

            if messages.is_empty() {
                if once {
                    break;
                }
                tokio::time::sleep(self.settings.poll_interval).await;
                continue;
            }

            match with_deadline(self.settings.invocation_timeout, self.invoke(worker, &messages)).await {
                Ok(()) => {
                    handled += messages.len();
                    for message in &messages {
                        match queue.delete(message.message_id).await {
                            Ok(()) => {}
                            Err(e) if once => return Err(e),
                            // Redelivery is absorbed by the store, so this is not fatal.
                            Err(e) => warn!(
                                "{} worker failed to delete {} from {}: {}",
                                worker,
                                message.message_id,
                                queue.name(),
                                e
                            ),
                        }
                    }
                }
                Err(e) => {
                    // Left in place; the messages reappear after the visibility timeout.
                    warn!("{} worker failed on {} message(s): {}", worker, messages.len(), e);
                }
            }
        }

        info!("{} worker handled {} message(s)", worker, handled);
        Ok(handled)
    }

    async fn invoke(&self, worker: Worker, messages: &[QueueMessage]) -> Result<()> {
        match worker {
            Worker::Feed => {
                let report: Option<FeedReport> = self.pipeline.handle_messages(messages).await?;
                if let Some(report) = report {
                    debug!("Feed run finished: {:?}", report);
                }
            }
            Worker::Delivery => {
                if self.committer.handle(messages).await? == CommitOutcome::Undelivered {
                    warn!("Notification committed without delivery");
                }
            }
        }
        Ok(())
    }
}

/// Run `invocation` under a deadline. On expiry the future is dropped, which
/// cancels whatever store or queue call it was waiting on.
pub async fn with_deadline<T, F>(deadline: Duration, invocation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, invocation).await {
        Ok(result) => result,
        Err(_) => Err(NotifierError::DeadlineExceeded {
            seconds: deadline.as_secs(),
        }),
    }
}

/// The database URL with any password replaced, fit for logs.
pub fn redact_database_url(database_url: &str) -> String {
    match Url::parse(database_url) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("***")).is_err() {
                return "<unprintable database url>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<unparseable database url>".to_string(),
    }
}
