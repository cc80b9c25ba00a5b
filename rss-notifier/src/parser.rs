use crate::types::{NotifierError, RawItem, Result};
use feed_rs::parser;
use tracing::debug;

/// Parses RSS, Atom and JSON feeds into raw items. No validation or
/// fallback happens here; that is the normalizer's job.
pub struct FeedParser;

impl FeedParser {
    pub fn parse_items(content: &[u8]) -> Result<Vec<RawItem>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        // A missing id must stay empty so the normalizer can fall back to the
        // link. The default generator hashes link and title instead.
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(content)
            .map_err(|e| NotifierError::Parse(format!("Failed to parse feed: {}", e)))?;

        let items: Vec<RawItem> = feed.entries.into_iter().map(Self::raw_item).collect();
        debug!("Parsed feed with {} entries", items.len());
        Ok(items)
    }

    fn raw_item(entry: feed_rs::model::Entry) -> RawItem {
        // The primary link is the first one that isn't marked as something
        // other than an alternate representation (enclosure, self, ...).
        let link = entry
            .links
            .iter()
            .find(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
            .map(|link| link.href.clone())
            .unwrap_or_default();

        RawItem {
            guid: entry.id,
            link,
            links: entry.links.into_iter().map(|link| link.href).collect(),
            published: entry.published.or(entry.updated),
        }
    }
}
