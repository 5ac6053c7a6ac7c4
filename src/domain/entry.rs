use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub description: String,
    pub thumbnail: String,
}

/// A YouTube channel or playlist entry, stored in the bucket named by `channel_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub channel_id: String,
    pub video_id: String,
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub author: Author,
    pub media: Media,
    /// Path of the downloaded audio, empty until resolved
    #[serde(default)]
    pub file: String,
    /// Seconds
    #[serde(default)]
    pub duration: u32,
}

impl Entry {
    pub fn new(channel_id: &str, video_id: &str, title: &str, published: DateTime<Utc>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            video_id: video_id.to_string(),
            title: title.to_string(),
            link: format!("https://www.youtube.com/watch?v={}", video_id),
            published,
            updated: published,
            author: Author::default(),
            media: Media::default(),
            file: String::new(),
            duration: 0,
        }
    }

    /// Channel-scoped identity, stable across republished timestamps.
    pub fn uid(&self) -> String {
        format!("{}::{}", self.channel_id, self.video_id)
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{channel: {}, video: {}, title: {:?}, published: {}, file: {}}}",
            self.channel_id,
            self.video_id,
            self.title,
            self.published.to_rfc3339(),
            self.file
        )
    }
}
