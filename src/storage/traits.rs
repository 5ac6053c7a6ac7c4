use crate::domain::{Entry, Item};
use crate::errors::FeederResult;
use crate::storage::record::RemovedRecord;

/// Plain-feed items, one bucket per feed name.
#[cfg_attr(test, mockall::automock)]
pub trait ItemRepository: Send + Sync {
    /// Returns `false` when an item with the same key is already stored.
    fn save(&self, feed: &str, item: &Item) -> FeederResult<bool>;
    fn load(&self, feed: &str, max: usize, skip_junk: bool) -> FeederResult<Vec<Item>>;
    fn exist(&self, feed: &str, item: &Item) -> FeederResult<bool>;
    fn remove(&self, feed: &str, guid: &str) -> FeederResult<RemovedRecord>;
    fn remove_old(&self, feed: &str, keep: usize) -> FeederResult<Vec<RemovedRecord>>;
    fn buckets(&self) -> FeederResult<Vec<String>>;
    fn set_junk(&self, feed: &str, guid: &str, junk: bool) -> FeederResult<()>;
}

/// YouTube entries, one bucket per channel id.
#[cfg_attr(test, mockall::automock)]
pub trait EntryRepository: Send + Sync {
    fn save(&self, entry: &Entry) -> FeederResult<bool>;
    fn load(&self, channel_id: &str, max: usize) -> FeederResult<Vec<Entry>>;
    fn exist(&self, entry: &Entry) -> FeederResult<bool>;
    fn remove(&self, channel_id: &str, video_id: &str) -> FeederResult<RemovedRecord>;
    fn remove_old(&self, channel_id: &str, keep: usize) -> FeederResult<Vec<RemovedRecord>>;

    fn set_processed(&self, entry: &Entry) -> FeederResult<()>;
    fn reset_processed(&self, entry: &Entry) -> FeederResult<()>;
    /// Published time recorded when the entry was first processed, if any.
    fn check_processed(&self, entry: &Entry) -> FeederResult<Option<String>>;
    fn count_processed(&self) -> FeederResult<usize>;
}
