mod connection;
mod entry_repository;
mod item_repository;

pub use connection::{RedbStorage, INTERNAL_BUCKET_PREFIX};
pub use entry_repository::RedbEntryRepository;
pub use item_repository::RedbItemRepository;
