use async_trait::async_trait;

use crate::domain::{ChannelKind, Entry, Item};
use crate::errors::FeederResult;

/// Fetches a plain RSS/Atom source and normalizes its items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FeederResult<Vec<Item>>;
}

/// Lists the entries of a YouTube channel or playlist, newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelService: Send + Sync {
    async fn get(&self, id: &str, kind: ChannelKind) -> FeederResult<Vec<Entry>>;
}

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file: String,
}

/// Fetches the audio of a video into a file named after `file_name`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn get(&self, video_id: &str, file_name: &str) -> FeederResult<Download>;
}

/// Length of a downloaded audio file.
#[cfg_attr(test, mockall::automock)]
pub trait DurationService: Send + Sync {
    /// Whole seconds, `0` when the file cannot be read or decoded.
    fn file(&self, path: &str) -> u32;
}
