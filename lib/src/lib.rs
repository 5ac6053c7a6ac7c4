//! Async client for a Notebrook-style channel messaging API.
//! Channels are addressed by name and created on first use.

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
    #[error("Invalid header value")]
    InvalidHeader,
    #[error("Payload too large")]
    PayloadTooLarge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    #[serde(deserialize_with = "deserialize_string_or_i64")]
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    channels: Vec<Channel>,
}

fn deserialize_string_or_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct StringOrI64Visitor;

    impl<'de> Visitor<'de> for StringOrI64Visitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or i64")
        }

        fn visit_i64<E>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E>(self, v: u64) -> Result<i64, E> {
            Ok(v as i64)
        }

        fn visit_str<E>(self, v: &str) -> Result<i64, E>
        where
            E: de::Error,
        {
            v.parse().map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_any(StringOrI64Visitor)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_string_or_i64")]
    pub id: i64,
    pub content: String,
    #[serde(alias = "channelId", alias = "channel_id", deserialize_with = "deserialize_string_or_i64")]
    pub channel_id: i64,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateChannelPayload<'a> {
    name: &'a str,
}

pub struct ChannelClient {
    url: String,
    client: Client,
    // name -> id, filled as channels are resolved
    known: Mutex<HashMap<String, i64>>,
}

impl ChannelClient {
    pub fn new(url: &str, token: &str) -> Result<Self, ChannelError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(token).map_err(|_| ChannelError::InvalidHeader)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            known: Mutex::new(HashMap::new()),
        })
    }

    /// List all available channels
    pub async fn list_channels(&self) -> Result<Vec<Channel>, ChannelError> {
        let response = self
            .client
            .get(format!("{}/channels", self.url))
            .send()
            .await?
            .error_for_status()?;

        let wrapper: ChannelsResponse = response.json().await?;
        Ok(wrapper.channels)
    }

    /// Find a channel ID by its name
    pub async fn find_channel_id_by_name(&self, name: &str) -> Result<Option<i64>, ChannelError> {
        if let Some(id) = self.cached(name) {
            return Ok(Some(id));
        }

        let channels = self.list_channels().await?;
        let id = channels.into_iter().find(|c| c.name == name).map(|c| c.id);
        if let Some(id) = id {
            self.remember(name, id);
        }
        Ok(id)
    }

    /// Create a new channel
    pub async fn create_channel(&self, name: &str) -> Result<Channel, ChannelError> {
        let response = self
            .client
            .post(format!("{}/channels/", self.url))
            .json(&CreateChannelPayload { name })
            .send()
            .await?
            .error_for_status()?;

        let channel: Channel = response.json().await?;
        self.remember(&channel.name, channel.id);
        Ok(channel)
    }

    /// Send a message to a channel by name, creating the channel if it doesn't exist
    pub async fn send_message(&self, channel_name: &str, content: &str) -> Result<Message, ChannelError> {
        let channel_id = match self.find_channel_id_by_name(channel_name).await? {
            Some(id) => id,
            None => self.create_channel(channel_name).await?.id,
        };

        let response = self
            .client
            .post(format!("{}/channels/{}/messages", self.url, channel_id))
            .json(&SendMessagePayload { content })
            .send()
            .await?;

        // 413 is reported on its own so callers can shrink the message
        if response.status() == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
            return Err(ChannelError::PayloadTooLarge);
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            self.forget(channel_name);
            return Err(ChannelError::ChannelNotFound(channel_name.to_string()));
        }

        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    fn cached(&self, name: &str) -> Option<i64> {
        self.known.lock().ok().and_then(|known| known.get(name).copied())
    }

    fn remember(&self, name: &str, id: i64) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(name.to_string(), id);
        }
    }

    fn forget(&self, name: &str) {
        if let Ok(mut known) = self.known.lock() {
            known.remove(name);
        }
    }
}
