pub mod record;
pub mod redb;
pub mod traits;

pub use self::redb::{RedbEntryRepository, RedbItemRepository, RedbStorage, INTERNAL_BUCKET_PREFIX};
pub use record::{hash_hex, store_key, Record, RemovedRecord};
pub use traits::{EntryRepository, ItemRepository};
