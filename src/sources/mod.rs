pub mod dates;
pub mod downloader;
pub mod duration;
pub mod rss_atom;
pub mod traits;
pub mod youtube;

pub use downloader::CommandDownloader;
pub use duration::Mp3Duration;
pub use rss_atom::RssAtomSource;
pub use traits::{ChannelService, Download, Downloader, DurationService, FeedFetcher};
pub use youtube::YouTubeSource;
