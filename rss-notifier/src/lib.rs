pub mod types;
pub mod ids;
pub mod batching;
pub mod normalizer;
pub mod fetcher;
pub mod parser;
pub mod traits;
pub mod sources;
pub mod store;
pub mod queue;
pub mod pipeline;
pub mod dispatch;
pub mod commit;
pub mod mailer;
pub mod config;
pub mod notifier;

pub use types::*;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use pipeline::{FanoutPipeline, FeedReport};
pub use commit::{CommitHandler, CommitOutcome};
pub use config::NotifierConfig;
pub use notifier::{Backends, RssNotifier, WorkerSettings};
