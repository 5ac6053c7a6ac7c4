use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::domain::{ChannelKind, Source};
use crate::errors::{FeederError, FeederResult};
use crate::sources::downloader::DEFAULT_DL_TEMPLATE;
use crate::sources::youtube::{DEFAULT_CHANNEL_BASE_URL, DEFAULT_PLAYLIST_BASE_URL};
use crate::storage::INTERNAL_BUCKET_PREFIX;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedConfig>,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub notebrook: NotebrookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    #[serde(default = "default_max_items_per_source")]
    pub max_items_per_source: usize,
    #[serde(default = "default_max_keep")]
    pub max_keep: usize,
    /// Worker tasks shared by all plain feeds
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
}

fn default_update_interval() -> u64 {
    300
}

fn default_max_items_per_source() -> usize {
    5
}

fn default_max_keep() -> usize {
    5000
}

fn default_concurrent() -> usize {
    8
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            max_items_per_source: default_max_items_per_source(),
            max_keep: default_max_keep(),
            concurrent: default_concurrent(),
        }
    }
}

impl SystemConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

/// A plain feed aggregating one or more sources into one bucket.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notify_channel: String,
    /// Items whose title matches are dropped
    #[serde(default)]
    pub filter_title: Option<String>,
    #[serde(default)]
    pub keep: Option<usize>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeConfig {
    /// Falls back to `system.update_interval_secs`
    #[serde(default)]
    pub update_interval_secs: Option<u64>,
    #[serde(default = "default_keep_per_channel")]
    pub keep_per_channel: usize,
    #[serde(default = "default_files_location")]
    pub files_location: String,
    #[serde(default = "default_dl_template")]
    pub dl_template: String,
    #[serde(default = "default_channel_base_url")]
    pub channel_base_url: String,
    #[serde(default = "default_playlist_base_url")]
    pub playlist_base_url: String,
    /// Downloads shorter than this are dropped, `0` keeps everything
    #[serde(default)]
    pub skip_shorts_secs: u64,
    /// Run `ytdlp_update_command` at most this often, `0` never
    #[serde(default)]
    pub ytdlp_update_interval_secs: u64,
    #[serde(default)]
    pub ytdlp_update_command: String,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

fn default_keep_per_channel() -> usize {
    5
}

fn default_files_location() -> String {
    "var/yt".to_string()
}

fn default_dl_template() -> String {
    DEFAULT_DL_TEMPLATE.to_string()
}

fn default_channel_base_url() -> String {
    DEFAULT_CHANNEL_BASE_URL.to_string()
}

fn default_playlist_base_url() -> String {
    DEFAULT_PLAYLIST_BASE_URL.to_string()
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: None,
            keep_per_channel: default_keep_per_channel(),
            files_location: default_files_location(),
            dl_template: default_dl_template(),
            channel_base_url: default_channel_base_url(),
            playlist_base_url: default_playlist_base_url(),
            skip_shorts_secs: 0,
            ytdlp_update_interval_secs: 0,
            ytdlp_update_command: String::new(),
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ChannelKind,
    /// Overrides `keep_per_channel`
    #[serde(default)]
    pub keep: Option<usize>,
    /// Only titles matching this are downloaded
    #[serde(default)]
    pub include: Option<String>,
    /// Titles matching this are skipped
    #[serde(default)]
    pub exclude: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotebrookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

impl Config {
    /// Get the directory where the executable is located
    pub fn exe_dir() -> Option<PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Load `.env` from the executable's directory, then the current one.
    pub fn load_env() {
        if let Some(dir) = Self::exe_dir() {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        dotenvy::dotenv().ok();
    }

    /// Default store location, next to the executable
    pub fn default_db_path() -> String {
        Self::exe_dir()
            .map(|d| d.join("feeder.db").to_string_lossy().into_owned())
            .unwrap_or_else(|| "./feeder.db".to_string())
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> FeederResult<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the TOML file and apply environment overrides. A missing file
    /// yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> FeederResult<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// `NOTEBROOK_URL` and `NOTEBROOK_TOKEN` win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NOTEBROOK_URL") {
            if !url.is_empty() {
                self.notebrook.url = url;
            }
        }
        if let Ok(token) = std::env::var("NOTEBROOK_TOKEN") {
            if !token.is_empty() {
                self.notebrook.token = token;
            }
        }
    }

    pub fn validate(&self) -> FeederResult<()> {
        if self.system.concurrent == 0 {
            return Err(FeederError::Config("system.concurrent must be at least 1".to_string()));
        }
        if self.system.update_interval_secs == 0 {
            return Err(FeederError::Config(
                "system.update_interval_secs must be positive".to_string(),
            ));
        }
        if self.youtube.update_interval_secs == Some(0) {
            return Err(FeederError::Config(
                "youtube.update_interval_secs must be positive".to_string(),
            ));
        }

        for (name, feed) in &self.feeds {
            if name.starts_with(INTERNAL_BUCKET_PREFIX) {
                return Err(FeederError::Config(format!(
                    "feed name {} uses the reserved {} prefix",
                    name, INTERNAL_BUCKET_PREFIX
                )));
            }
            if self.youtube_channel(name).is_some() {
                return Err(FeederError::Config(format!(
                    "feed {} shares its bucket with a youtube channel",
                    name
                )));
            }
            for source in &feed.sources {
                if source.url.trim().is_empty() {
                    return Err(FeederError::Config(format!("feed {} has a source without url", name)));
                }
                Url::parse(&source.url)
                    .map_err(|e| FeederError::InvalidUrl(format!("{}: {}", source.url, e)))?;
            }
        }
        if self.youtube.channels.iter().any(|c| c.id.trim().is_empty()) {
            return Err(FeederError::Config("youtube channel without id".to_string()));
        }
        if let Some(c) = self
            .youtube
            .channels
            .iter()
            .find(|c| c.id.starts_with(INTERNAL_BUCKET_PREFIX))
        {
            return Err(FeederError::Config(format!(
                "youtube channel id {} uses the reserved {} prefix",
                c.id, INTERNAL_BUCKET_PREFIX
            )));
        }

        Ok(())
    }

    /// Retention for a plain feed bucket.
    pub fn feed_keep(&self, feed: &FeedConfig) -> usize {
        feed.keep.unwrap_or(self.system.max_keep)
    }

    pub fn youtube_interval(&self) -> Duration {
        Duration::from_secs(
            self.youtube
                .update_interval_secs
                .unwrap_or(self.system.update_interval_secs),
        )
    }

    /// Self-update command and its period, when both are set.
    pub fn ytdlp_update(&self) -> Option<(&str, Duration)> {
        let command = self.youtube.ytdlp_update_command.trim();
        if command.is_empty() || self.youtube.ytdlp_update_interval_secs == 0 {
            return None;
        }
        Some((command, Duration::from_secs(self.youtube.ytdlp_update_interval_secs)))
    }

    pub fn youtube_channel(&self, id: &str) -> Option<&ChannelConfig> {
        self.youtube.channels.iter().find(|c| c.id == id)
    }
}
