mod common;

use chrono::{TimeZone, Utc};
use common::{init_tracing, item};
use rss_notifier::normalizer::{normalize, normalize_observed_at};
use rss_notifier::types::{RawItem, Result};
use rss_notifier::FeedParser;

const FEED: &str = "F";

#[test]
fn test_fallback_chain() {
    init_tracing();
    let observed_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let published = Utc.with_ymd_and_hms(2024, 4, 30, 8, 30, 0).unwrap();

    let items = vec![
        // Complete item.
        RawItem {
            published: Some(published),
            ..item("p1", "http://e/1")
        },
        // No GUID: the link is the id.
        item("", "http://e/2"),
        // Nothing to identify it by.
        item("", ""),
        // GUID is a URL and there is no link: the GUID is the link.
        item("https://e/3", ""),
        // GUID that is not a URL and no link at all.
        item("tag:e,2024:4", ""),
        // Only an alternate link.
        RawItem {
            guid: "p5".to_owned(),
            links: vec!["http://e/5".to_owned(), "http://e/5.mp3".to_owned()],
            ..Default::default()
        },
    ];

    let posts = normalize_observed_at(FEED, items, observed_at);
    let summary: Vec<(&str, &str)> = posts.iter().map(|p| (p.id.as_str(), p.link.as_str())).collect();
    assert_eq!(
        summary,
        vec![
            ("p1", "http://e/1"),
            ("http://e/2", "http://e/2"),
            ("https://e/3", "https://e/3"),
            ("p5", "http://e/5"),
        ]
    );

    assert_eq!(posts[0].posted, published);
    assert!(posts[1..].iter().all(|p| p.posted == observed_at));
    assert!(posts.iter().all(|p| p.feed == FEED));
}

#[test]
fn test_repeated_ids_keep_first() {
    let posts = normalize(FEED, vec![item("p1", "http://e/1"), item("p1", "http://e/other")]);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].link, "http://e/1");
}

#[test]
fn test_empty_input() {
    assert!(normalize(FEED, Vec::new()).is_empty());
}

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example blog</title>
    <link>https://blog.example/</link>
    <description>Posts</description>
    <item>
      <title>First</title>
      <link>https://blog.example/first</link>
      <guid isPermaLink="false">post-1</guid>
      <pubDate>Tue, 30 Apr 2024 08:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Second</title>
      <link>https://blog.example/second</link>
      <guid>https://blog.example/second</guid>
    </item>
  </channel>
</rss>"#;

#[test]
fn test_parse_and_normalize_rss() -> Result<()> {
    init_tracing();

    let items = FeedParser::parse_items(RSS.as_bytes())?;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].guid, "post-1");
    assert_eq!(items[0].link, "https://blog.example/first");
    assert_eq!(
        items[0].published,
        Some(Utc.with_ymd_and_hms(2024, 4, 30, 8, 30, 0).unwrap())
    );
    assert_eq!(items[1].published, None);

    let posts = normalize(FEED, items);
    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["post-1", "https://blog.example/second"]);
    Ok(())
}

const RSS_WITHOUT_GUID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example blog</title>
    <link>https://blog.example/</link>
    <description>Posts</description>
    <item>
      <title>No guid</title>
      <link>https://blog.example/no-guid</link>
    </item>
  </channel>
</rss>"#;

#[test]
fn test_missing_guid_falls_back_to_link() -> Result<()> {
    init_tracing();

    let items = FeedParser::parse_items(RSS_WITHOUT_GUID.as_bytes())?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].guid, "");

    let posts = normalize(FEED, items);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, "https://blog.example/no-guid");
    assert_eq!(posts[0].link, "https://blog.example/no-guid");

    // A retitled post keeps its id.
    let retitled = RSS_WITHOUT_GUID.replace("No guid", "New title");
    let posts = normalize(FEED, FeedParser::parse_items(retitled.as_bytes())?);
    assert_eq!(posts[0].id, "https://blog.example/no-guid");
    Ok(())
}

#[test]
fn test_parse_rejects_garbage() {
    assert!(FeedParser::parse_items(b"this is not a feed").is_err());
}
