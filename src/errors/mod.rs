use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeederError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Feed errors
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Parsing errors
    #[error("Feed parsing failed: {0}")]
    FeedParse(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: Box<FeederError>,
    },

    #[error("No bucket for {0}")]
    NoBucket(String),

    #[error("Record {id} not found in {bucket}")]
    RecordNotFound { bucket: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Download errors
    #[error("Download failed: {0}")]
    Download(String),

    #[error("Download produced no file: {0}")]
    DownloadSkipped(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Channel errors from notebrook library
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Cancelled")]
    Cancelled,
}

impl FeederError {
    /// Wrap an error with the store operation that produced it.
    pub fn in_op(self, context: impl Into<String>) -> Self {
        match self {
            // Callers match on these, keep them unwrapped
            e @ (FeederError::NoBucket(_)
            | FeederError::RecordNotFound { .. }
            | FeederError::InvalidTimestamp(_)) => e,
            e => FeederError::Storage {
                context: context.into(),
                source: Box::new(e),
            },
        }
    }
}

impl From<channels::ChannelError> for FeederError {
    fn from(err: channels::ChannelError) -> Self {
        FeederError::Channel(err.to_string())
    }
}

impl From<toml::de::Error> for FeederError {
    fn from(err: toml::de::Error) -> Self {
        FeederError::Config(err.to_string())
    }
}

macro_rules! redb_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FeederError {
                fn from(err: $ty) -> Self {
                    FeederError::Database(err.into())
                }
            }
        )*
    };
}

redb_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type FeederResult<T> = Result<T, FeederError>;
