use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, warn};

use crate::domain::{ChannelKind, Entry};
use crate::errors::{FeederError, FeederResult};
use crate::sources::dates::parse_timestamp;
use crate::sources::traits::ChannelService;

const VIDEO_ID_PREFIX: &str = "yt:video:";

pub const DEFAULT_CHANNEL_BASE_URL: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";
pub const DEFAULT_PLAYLIST_BASE_URL: &str = "https://www.youtube.com/feeds/videos.xml?playlist_id=";

/// Lists channel and playlist entries from the public YouTube Atom feeds.
pub struct YouTubeSource {
    client: Client,
    channel_base_url: String,
    playlist_base_url: String,
}

impl YouTubeSource {
    pub fn new(channel_base_url: impl Into<String>, playlist_base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            channel_base_url: channel_base_url.into(),
            playlist_base_url: playlist_base_url.into(),
        }
    }

    fn build_feed_url(&self, id: &str, kind: ChannelKind) -> String {
        match kind {
            ChannelKind::Channel => format!("{}{}", self.channel_base_url, id),
            ChannelKind::Playlist => format!("{}{}", self.playlist_base_url, id),
        }
    }

    /// Parse a YouTube Atom payload. Every entry is assigned to `channel_id`,
    /// whatever the feed itself says, and the result is sorted newest first.
    pub fn entries_from_bytes(bytes: &[u8], channel_id: &str) -> FeederResult<Vec<Entry>> {
        let parsed = parser::Builder::new()
            .timestamp_parser(parse_timestamp)
            .build()
            .parse(bytes)
            .map_err(|e| FeederError::FeedParse(e.to_string()))?;

        let mut entries: Vec<Entry> = parsed
            .entries
            .into_iter()
            .filter_map(|e| Self::convert(e, channel_id))
            .collect();
        entries.sort_by(|a, b| b.published.cmp(&a.published));

        Ok(entries)
    }

    fn convert(entry: feed_rs::model::Entry, channel_id: &str) -> Option<Entry> {
        let video_id = entry
            .id
            .strip_prefix(VIDEO_ID_PREFIX)
            .unwrap_or(&entry.id)
            .to_string();

        let Some(published) = entry.published.or(entry.updated) else {
            warn!(channel = channel_id, video = %video_id, "entry without a date, skipped");
            return None;
        };

        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let mut result = Entry::new(channel_id, &video_id, title.trim(), published);
        result.updated = entry.updated.unwrap_or(published);

        if let Some(link) = entry.links.into_iter().next() {
            result.link = link.href;
        }
        if let Some(author) = entry.authors.into_iter().next() {
            result.author.name = author.name;
            result.author.uri = author.uri.unwrap_or_default();
        }
        if let Some(media) = entry.media.into_iter().next() {
            result.media.description = media.description.map(|d| d.content).unwrap_or_default();
            result.media.thumbnail = media
                .thumbnails
                .into_iter()
                .next()
                .map(|t| t.image.uri)
                .unwrap_or_default();
        }

        Some(result)
    }
}

impl Default for YouTubeSource {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_BASE_URL, DEFAULT_PLAYLIST_BASE_URL)
    }
}

#[async_trait]
impl ChannelService for YouTubeSource {
    async fn get(&self, id: &str, kind: ChannelKind) -> FeederResult<Vec<Entry>> {
        let url = self.build_feed_url(id, kind);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FeederError::FeedParse(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        let entries = Self::entries_from_bytes(&bytes, id)?;
        debug!(channel = id, kind = %kind, entries = entries.len(), "listed channel");
        Ok(entries)
    }
}
