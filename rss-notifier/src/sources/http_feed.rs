use crate::traits::FeedSource;
use crate::types::{FetchConfig, RawItem, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::info;

/// Feed source that fetches over HTTP and parses with feed-rs.
pub struct HttpFeedSource {
    fetcher: Fetcher,
}

impl HttpFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_items(&self, feed: &str) -> Result<Vec<RawItem>> {
        let content = self.fetcher.fetch_feed(feed).await?;
        let items = FeedParser::parse_items(&content)?;

        info!("Pulled {} items from feed {}", items.len(), feed);
        Ok(items)
    }
}
