use tracing::debug;

use crate::domain::Entry;
use crate::errors::FeederResult;
use crate::storage::record::{hash_hex, RemovedRecord};
use crate::storage::redb::RedbStorage;
use crate::storage::traits::EntryRepository;

/// Entries live in the bucket named by their channel id. Processed markers
/// are kept apart so they outlive retention.
pub struct RedbEntryRepository {
    storage: RedbStorage,
}

impl RedbEntryRepository {
    pub fn new(storage: RedbStorage) -> Self {
        Self { storage }
    }

    fn marker_key(entry: &Entry) -> String {
        hash_hex(&entry.uid())
    }
}

impl EntryRepository for RedbEntryRepository {
    fn save(&self, entry: &Entry) -> FeederResult<bool> {
        self.storage.save(&entry.channel_id, entry)
    }

    fn load(&self, channel_id: &str, max: usize) -> FeederResult<Vec<Entry>> {
        self.storage.load(channel_id, max, false)
    }

    fn exist(&self, entry: &Entry) -> FeederResult<bool> {
        self.storage.exist(&entry.channel_id, entry)
    }

    fn remove(&self, channel_id: &str, video_id: &str) -> FeederResult<RemovedRecord> {
        self.storage.remove::<Entry>(channel_id, video_id)
    }

    fn remove_old(&self, channel_id: &str, keep: usize) -> FeederResult<Vec<RemovedRecord>> {
        self.storage.remove_old::<Entry>(channel_id, keep)
    }

    fn set_processed(&self, entry: &Entry) -> FeederResult<()> {
        debug!(channel = %entry.channel_id, video = %entry.video_id, "marking processed");
        self.storage
            .put_marker(&Self::marker_key(entry), &entry.published.to_rfc3339())
    }

    fn reset_processed(&self, entry: &Entry) -> FeederResult<()> {
        self.storage.delete_marker(&Self::marker_key(entry))
    }

    fn check_processed(&self, entry: &Entry) -> FeederResult<Option<String>> {
        self.storage.get_marker(&Self::marker_key(entry))
    }

    fn count_processed(&self) -> FeederResult<usize> {
        self.storage.count_markers()
    }
}
