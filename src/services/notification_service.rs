use async_trait::async_trait;
use channels::{ChannelClient, ChannelError};
use tracing::{debug, warn};

use crate::config::NotebrookConfig;
use crate::domain::Notification;
use crate::errors::FeederResult;

/// Delivers a notification to a named channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// An empty `channel` means the feed has no destination and is a no-op.
    async fn send(&self, channel: &str, notification: &Notification) -> FeederResult<()>;
}

/// Pushes messages through the Notebrook channel API.
pub struct NotificationService {
    client: Option<ChannelClient>,
}

impl NotificationService {
    pub fn new(config: &NotebrookConfig) -> FeederResult<Self> {
        if config.url.is_empty() {
            debug!("notebrook url not set, notifications disabled");
            return Ok(Self::disabled());
        }

        let client = ChannelClient::new(&config.url, &config.token)?;
        Ok(Self {
            client: Some(client),
        })
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Send the full message, shrinking the text while the server answers 413
    async fn deliver(
        client: &ChannelClient,
        channel: &str,
        notification: &Notification,
    ) -> FeederResult<()> {
        let message = notification.format();
        match client.send_message(channel, &message).await {
            Ok(_) => return Ok(()),
            Err(ChannelError::PayloadTooLarge) => {}
            Err(e) => return Err(e.into()),
        }

        let mut truncated = notification.clone();
        let mut high = truncated.text.chars().count();

        while high > 0 {
            let mid = high / 2;
            truncated.text = truncate_to_char_boundary(&notification.text, mid);

            let message = truncated.format();
            match client.send_message(channel, &message).await {
                Ok(_) => {
                    warn!(channel, kept = mid, "notification text truncated");
                    return Ok(());
                }
                Err(ChannelError::PayloadTooLarge) => {
                    high = mid;
                }
                Err(e) => return Err(e.into()),
            }
        }

        truncated.text = String::new();
        let message = truncated.format();
        client.send_message(channel, &message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn send(&self, channel: &str, notification: &Notification) -> FeederResult<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        if channel.is_empty() {
            return Ok(());
        }

        Self::deliver(client, channel, notification).await?;
        debug!(channel, title = %notification.item_title, "notification sent");
        Ok(())
    }
}

/// Truncate string to at most `max_chars` characters, respecting char boundaries
fn truncate_to_char_boundary(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
