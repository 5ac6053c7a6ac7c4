use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{Entry, Item};
use crate::errors::{FeederError, FeederResult};

/// Anything that can live in a bucket.
pub trait Record: Serialize + DeserializeOwned {
    /// Stable identity within a bucket (GUID, video id)
    fn identifier(&self) -> &str;

    /// Timestamp leading the store key
    fn timestamp(&self) -> FeederResult<DateTime<Utc>>;

    fn is_junk(&self) -> bool {
        false
    }

    /// External file owned by the record, removed by callers on retention
    fn attached_file(&self) -> Option<&str> {
        None
    }
}

/// A record deleted by retention or explicit removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedRecord {
    pub key: String,
    pub identifier: String,
    pub file: Option<String>,
}

/// Build `<unix-timestamp>-<sha256-hex>`.
///
/// Seconds are zero-padded to 10 digits so that byte order matches time order.
pub fn store_key<R: Record>(record: &R) -> FeederResult<String> {
    let ts = record.timestamp()?;
    let secs = ts.timestamp();
    if secs < 0 {
        return Err(FeederError::InvalidTimestamp(format!(
            "{} is before the unix epoch",
            ts.to_rfc3339()
        )));
    }

    Ok(format!("{:010}-{}", secs, hash_hex(record.identifier())))
}

pub fn hash_hex(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

impl Record for Item {
    fn identifier(&self) -> &str {
        &self.guid
    }

    fn timestamp(&self) -> FeederResult<DateTime<Utc>> {
        if let Some(dt) = self.dt {
            return Ok(dt);
        }

        DateTime::parse_from_rfc2822(&self.pub_date)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FeederError::InvalidTimestamp(format!("{:?}: {}", self.pub_date, e)))
    }

    fn is_junk(&self) -> bool {
        self.junk
    }
}

impl Record for Entry {
    fn identifier(&self) -> &str {
        &self.video_id
    }

    fn timestamp(&self) -> FeederResult<DateTime<Utc>> {
        Ok(self.published)
    }

    fn attached_file(&self) -> Option<&str> {
        if self.file.is_empty() {
            None
        } else {
            Some(&self.file)
        }
    }
}
