use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use crate::domain::{Enclosure, FeedType, Item};
use crate::errors::{FeederError, FeederResult};
use crate::sources::dates::parse_timestamp;
use crate::sources::traits::FeedFetcher;

const FETCH_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("feed-keeper/", env!("CARGO_PKG_VERSION"));

/// A fetched feed after normalization.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub feed_type: FeedType,
    pub items: Vec<Item>,
}

pub struct RssAtomSource {
    client: Client,
}

impl RssAtomSource {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> FeederResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FeederError::FeedParse(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Parse an RSS or Atom payload into normalized items.
    pub fn parse_bytes(bytes: &[u8]) -> FeederResult<ParsedFeed> {
        let parsed = parser::Builder::new()
            .timestamp_parser(parse_timestamp)
            .build()
            .parse(bytes)
            .map_err(|e| FeederError::FeedParse(e.to_string()))?;

        let feed_type = Self::determine_feed_type(&parsed);
        let title = parsed.title.map(|t| t.content).unwrap_or_default();
        let items = parsed.entries.into_iter().map(Self::normalize).collect();

        Ok(ParsedFeed {
            title,
            feed_type,
            items,
        })
    }

    fn normalize(entry: feed_rs::model::Entry) -> Item {
        let title = entry
            .title
            .map(|t| t.content.replace('\n', "").trim().to_string())
            .unwrap_or_default();

        let link = entry
            .links
            .into_iter()
            .next()
            .map(|l| l.href)
            .unwrap_or_default();

        // full content wins over the summary
        let description = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| entry.summary.map(|s| s.content))
            .unwrap_or_default();

        let enclosure = entry
            .media
            .into_iter()
            .flat_map(|m| m.content)
            .find_map(|c| {
                c.url.map(|url| Enclosure {
                    url: url.to_string(),
                    length: c.size.unwrap_or(0),
                    mime_type: c.content_type.map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .unwrap_or_default();

        let author = entry
            .authors
            .into_iter()
            .next()
            .map(|p| p.name)
            .unwrap_or_default();

        let item = Item::new(entry.id, title)
            .with_link(link)
            .with_description(description)
            .with_enclosure(enclosure)
            .with_author(author);

        match entry.published.or(entry.updated) {
            Some(dt) => item.with_dt(dt),
            None => item,
        }
    }

    fn determine_feed_type(feed: &feed_rs::model::Feed) -> FeedType {
        match feed.feed_type {
            feed_rs::model::FeedType::Atom => FeedType::Atom,
            feed_rs::model::FeedType::JSON => FeedType::Json,
            _ => FeedType::Rss,
        }
    }
}

impl Default for RssAtomSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for RssAtomSource {
    async fn fetch(&self, url: &str) -> FeederResult<Vec<Item>> {
        let bytes = self.fetch_bytes(url).await?;
        let parsed = Self::parse_bytes(&bytes)?;

        debug!(
            url,
            title = %parsed.title,
            feed_type = parsed.feed_type.as_str(),
            items = parsed.items.len(),
            "fetched feed"
        );
        Ok(parsed.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Radio-T</title>
    <link>https://radio-t.com/</link>
    <description>Weekly tech podcast</description>
    <item>
      <title>Радио-Т 901
      </title>
      <link>https://radio-t.com/p/2024/02/17/podcast-901/</link>
      <description><![CDATA[<p>Show notes</p>]]></description>
      <pubDate>Sat, 17 Feb 2024 20:00:00 GMT</pubDate>
      <guid>https://radio-t.com/p/2024/02/17/podcast-901/</guid>
      <author>podcast@radio-t.com (Umputun)</author>
      <enclosure url="https://cdn.radio-t.com/rt_podcast901.mp3" length="93487653" type="audio/mp3"/>
    </item>
    <item>
      <title>Радио-Т 900</title>
      <link>https://radio-t.com/p/2024/02/10/podcast-900/</link>
      <description>Previous week</description>
      <pubDate>Sat, 10 Feb 2024 23:00:00 +0300</pubDate>
      <guid>https://radio-t.com/p/2024/02/10/podcast-900/</guid>
    </item>
    <item>
      <title>Broken date</title>
      <link>https://radio-t.com/p/broken/</link>
      <pubDate>100500</pubDate>
      <guid>broken</guid>
    </item>
    <item>
      <title>Wrong day name</title>
      <link>https://radio-t.com/p/2024/02/10/wrong-day/</link>
      <pubDate>Mon, 10 Feb 2024 20:00:00 GMT</pubDate>
      <guid>wrong-day</guid>
    </item>
  </channel>
</rss>"#;

    const SAMPLE_ATOM: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Tech Blog</title>
  <link href="https://example.com/"/>
  <id>https://example.com/feed.atom</id>
  <updated>2024-01-15T12:00:00Z</updated>
  <entry>
    <title>Understanding WebAssembly</title>
    <link href="https://example.com/posts/wasm-intro"/>
    <id>https://example.com/posts/wasm-intro</id>
    <updated>2024-01-15T12:00:00Z</updated>
    <author><name>Jane Doe</name></author>
    <summary type="html"><![CDATA[<p>Short summary</p>]]></summary>
    <content type="html"><![CDATA[<article><p>Full article body</p></article>]]></content>
  </entry>
</feed>"#;

    #[test]
    fn test_rss_items_normalized() {
        let parsed = RssAtomSource::parse_bytes(SAMPLE_RSS.as_bytes()).unwrap();

        assert_eq!(parsed.title, "Radio-T");
        assert_eq!(parsed.feed_type, FeedType::Rss);
        assert_eq!(parsed.items.len(), 4);

        let first = &parsed.items[0];
        assert_eq!(first.title, "Радио-Т 901");
        assert_eq!(first.guid, "https://radio-t.com/p/2024/02/17/podcast-901/");
        assert_eq!(first.link, "https://radio-t.com/p/2024/02/17/podcast-901/");
        assert!(first.description.contains("Show notes"));
        assert_eq!(first.pub_date, "Sat, 17 Feb 2024 20:00:00 +0000");
        assert!(first.dt.is_some());
    }

    #[test]
    fn test_rss_enclosure_extracted() {
        let parsed = RssAtomSource::parse_bytes(SAMPLE_RSS.as_bytes()).unwrap();
        let enclosure = &parsed.items[0].enclosure;

        assert_eq!(enclosure.url, "https://cdn.radio-t.com/rt_podcast901.mp3");
        assert_eq!(enclosure.length, 93487653);
        assert_eq!(enclosure.mime_type, "audio/mp3");

        assert_eq!(parsed.items[1].enclosure, Enclosure::default());
    }

    #[test]
    fn test_rss_offset_date_canonicalized() {
        let parsed = RssAtomSource::parse_bytes(SAMPLE_RSS.as_bytes()).unwrap();
        assert_eq!(parsed.items[1].pub_date, "Sat, 10 Feb 2024 20:00:00 +0000");
    }

    #[test]
    fn test_unparseable_date_left_unresolved() {
        let parsed = RssAtomSource::parse_bytes(SAMPLE_RSS.as_bytes()).unwrap();
        let broken = &parsed.items[2];

        assert_eq!(broken.guid, "broken");
        assert!(broken.dt.is_none());
        assert!(broken.pub_date.is_empty());
    }

    #[test]
    fn test_wrong_day_name_still_resolves() {
        let parsed = RssAtomSource::parse_bytes(SAMPLE_RSS.as_bytes()).unwrap();
        let item = &parsed.items[3];

        assert_eq!(item.guid, "wrong-day");
        assert_eq!(item.dt.map(|dt| dt.to_rfc3339()).unwrap_or_default(), "2024-02-10T20:00:00+00:00");
        assert_eq!(item.pub_date, "Sat, 10 Feb 2024 20:00:00 +0000");
    }

    #[test]
    fn test_atom_prefers_content_over_summary() {
        let parsed = RssAtomSource::parse_bytes(SAMPLE_ATOM).unwrap();

        assert_eq!(parsed.feed_type, FeedType::Atom);
        assert_eq!(parsed.items.len(), 1);

        let item = &parsed.items[0];
        assert_eq!(item.title, "Understanding WebAssembly");
        assert!(item.description.contains("Full article body"));
        assert!(!item.description.contains("Short summary"));
        assert_eq!(item.author, "Jane Doe");
        assert_eq!(item.link, "https://example.com/posts/wasm-intro");
        assert_eq!(item.pub_date, "Mon, 15 Jan 2024 12:00:00 +0000");
    }

    #[test]
    fn test_invalid_payload() {
        let result = RssAtomSource::parse_bytes(b"<html><body>not a feed</body></html>");
        assert!(matches!(result, Err(FeederError::FeedParse(_))));
    }
}
