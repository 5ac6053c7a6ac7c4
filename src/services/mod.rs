pub mod ingest_service;
pub mod notification_service;
pub mod youtube_service;

pub use ingest_service::{CycleStats, IngestService};
pub use notification_service::{NotificationService, Notifier};
pub use youtube_service::{ChannelStats, YouTubeService};

use crate::errors::FeederResult;

/// Run a store call on the blocking pool. redb commits fsync and writers
/// queue behind a single lock, neither belongs on a runtime worker.
pub(crate) async fn blocking<T, F>(f: F) -> FeederResult<T>
where
    F: FnOnce() -> FeederResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
