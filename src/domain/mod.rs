pub mod entry;
pub mod feed;
pub mod item;
pub mod notification;

pub use entry::{Author, Entry, Media};
pub use feed::{ChannelKind, FeedType, Source};
pub use item::{Enclosure, Item};
pub use notification::Notification;
