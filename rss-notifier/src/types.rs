// Use the interfaces crate for the record and message definitions
pub use interfaces::defs::{FeedIdentity, NotificationJob, PostRecord, RawItem, SentMarker, SubscriberRecord};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "RSS-Notifier/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{operation} failed for {scope}: {source}")]
    Store {
        operation: &'static str,
        scope: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Malformed record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("{operation} on queue {queue} failed: {source}")]
    Queue {
        queue: String,
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed notification job in message {message_id}: {source}")]
    MalformedJob {
        message_id: uuid::Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to fetch feed {feed}: {source}")]
    FeedFetch {
        feed: String,
        #[source]
        source: Box<NotifierError>,
    },

    #[error("Failed to enqueue notifications for post {post_id} of {feed}: {source}")]
    Enqueue {
        feed: String,
        post_id: String,
        #[source]
        source: Box<NotifierError>,
    },

    #[error("Batch of {count} messages exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("Expected 1 message per invocation, got {count}")]
    UnexpectedBatch { count: usize },

    #[error("Invocation exceeded its deadline of {seconds}s")]
    DeadlineExceeded { seconds: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
