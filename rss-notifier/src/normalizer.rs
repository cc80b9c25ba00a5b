use crate::types::{PostRecord, RawItem};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Turn raw feed items into post records, stamping undated items with the
/// current time.
pub fn normalize(feed: &str, raw_items: Vec<RawItem>) -> Vec<PostRecord> {
    normalize_observed_at(feed, raw_items, Utc::now())
}

/// Same as [`normalize`] with an explicit observation time.
///
/// Items without a usable id or link are dropped. Upstream feeds are full of
/// these and there is nothing to do about any single one. Input order is
/// preserved, and a repeated id keeps its first occurrence.
pub fn normalize_observed_at(feed: &str, raw_items: Vec<RawItem>, observed_at: DateTime<Utc>) -> Vec<PostRecord> {
    let total = raw_items.len();
    let mut seen_ids = HashSet::new();
    let mut posts = Vec::with_capacity(total);

    for item in raw_items {
        let Some(id) = resolve_id(&item) else {
            debug!("Skipping item without guid or link in {}", feed);
            continue;
        };
        let Some(link) = resolve_link(&item) else {
            debug!("Skipping item {} without a usable link in {}", id, feed);
            continue;
        };
        if !seen_ids.insert(id.to_owned()) {
            debug!("Skipping repeated item {} in {}", id, feed);
            continue;
        }

        posts.push(PostRecord {
            feed: feed.to_owned(),
            id: id.to_owned(),
            link: link.to_owned(),
            posted: item.published.unwrap_or(observed_at),
        });
    }

    if posts.len() < total {
        debug!("Normalized {} of {} items from {}", posts.len(), total, feed);
    }
    posts
}

fn resolve_id(item: &RawItem) -> Option<&str> {
    [item.guid.as_str(), item.link.as_str()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
}

fn resolve_link(item: &RawItem) -> Option<&str> {
    if !item.link.is_empty() {
        return Some(&item.link);
    }
    if let Some(alternate) = item.links.first().filter(|link| !link.is_empty()) {
        return Some(alternate);
    }
    if is_absolute_http_url(&item.guid) {
        return Some(&item.guid);
    }
    None
}

fn is_absolute_http_url(candidate: &str) -> bool {
    candidate.starts_with("https://") || candidate.starts_with("http://")
}
