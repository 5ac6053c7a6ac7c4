use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError, TableHandle,
    WriteTransaction,
};
use tracing::{debug, info, warn};

use crate::errors::{FeederError, FeederResult};
use crate::storage::record::{store_key, Record, RemovedRecord};

/// Internal table holding out-of-band markers, hidden from bucket listings.
pub(crate) const MARKERS_TABLE: &str = "__processed";

/// Bucket names starting with this are reserved for the store itself.
pub const INTERNAL_BUCKET_PREFIX: &str = "__";

fn bucket_def(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn has_bucket(txn: &WriteTransaction, name: &str) -> FeederResult<bool> {
    Ok(txn.list_tables()?.any(|handle| handle.name() == name))
}

/// Bucketed record store on a single redb file.
///
/// Every bucket is a table keyed by `store_key`, so a reverse scan is a
/// newest-first walk.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> FeederResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        info!(path = %path.display(), "opening store");
        let db = Database::create(path)?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn in_memory() -> FeederResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert unless the key is already present. Returns whether a record was created.
    pub fn save<R: Record>(&self, bucket: &str, record: &R) -> FeederResult<bool> {
        let key = store_key(record)?;

        let result = (|| -> FeederResult<bool> {
            let data = serde_json::to_vec(record)?;
            let txn = self.db.begin_write()?;
            let created = {
                let mut table = txn.open_table(bucket_def(bucket))?;
                if table.get(key.as_str())?.is_some() {
                    false
                } else {
                    table.insert(key.as_str(), data.as_slice())?;
                    true
                }
            };
            txn.commit()?;
            Ok(created)
        })();

        match result {
            Ok(true) => debug!(bucket, key = %key, id = record.identifier(), "saved"),
            Ok(false) => debug!(bucket, key = %key, "already stored"),
            Err(_) => {}
        }
        result.map_err(|e| e.in_op(format!("save {}", bucket)))
    }

    /// Up to `max` records, newest first.
    pub fn load<R: Record>(&self, bucket: &str, max: usize, skip_junk: bool) -> FeederResult<Vec<R>> {
        let result = (|| -> FeederResult<Vec<R>> {
            let txn = self.db.begin_read()?;
            let table = match txn.open_table(bucket_def(bucket)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => {
                    return Err(FeederError::NoBucket(bucket.to_string()))
                }
                Err(e) => return Err(e.into()),
            };

            let mut records = Vec::new();
            if max == 0 {
                return Ok(records);
            }

            for row in table.iter()?.rev() {
                let (key, value) = row?;
                let record: R = match serde_json::from_slice(value.value()) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(bucket, key = key.value(), "failed to decode record: {}", e);
                        continue;
                    }
                };
                if skip_junk && record.is_junk() {
                    continue;
                }
                records.push(record);
                if records.len() >= max {
                    break;
                }
            }
            Ok(records)
        })();

        result.map_err(|e| e.in_op(format!("load {}", bucket)))
    }

    /// Whether the record's key is present. A missing bucket is not created.
    pub fn exist<R: Record>(&self, bucket: &str, record: &R) -> FeederResult<bool> {
        let key = store_key(record)?;

        let result = (|| -> FeederResult<bool> {
            let txn = self.db.begin_read()?;
            let table = match txn.open_table(bucket_def(bucket)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(false),
                Err(e) => return Err(e.into()),
            };
            let found = table.get(key.as_str())?.is_some();
            Ok(found)
        })();

        result.map_err(|e| e.in_op(format!("exist {}", bucket)))
    }

    /// Delete the record whose identifier matches. Linear in the bucket size.
    pub fn remove<R: Record>(&self, bucket: &str, identifier: &str) -> FeederResult<RemovedRecord> {
        let result = (|| -> FeederResult<RemovedRecord> {
            let txn = self.db.begin_write()?;
            if !has_bucket(&txn, bucket)? {
                txn.abort()?;
                return Err(FeederError::NoBucket(bucket.to_string()));
            }

            let removed = {
                let mut table = txn.open_table(bucket_def(bucket))?;
                let mut found = None;
                for row in table.iter()?.rev() {
                    let (key, value) = row?;
                    match serde_json::from_slice::<R>(value.value()) {
                        Ok(record) if record.identifier() == identifier => {
                            found = Some(RemovedRecord {
                                key: key.value().to_string(),
                                identifier: identifier.to_string(),
                                file: record.attached_file().map(str::to_string),
                            });
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => warn!(bucket, key = key.value(), "failed to decode record: {}", e),
                    }
                }
                if let Some(removed) = &found {
                    table.remove(removed.key.as_str())?;
                }
                found
            };

            match removed {
                Some(removed) => {
                    txn.commit()?;
                    info!(bucket, key = %removed.key, id = identifier, "removed");
                    Ok(removed)
                }
                None => {
                    txn.abort()?;
                    Err(FeederError::RecordNotFound {
                        bucket: bucket.to_string(),
                        id: identifier.to_string(),
                    })
                }
            }
        })();

        result.map_err(|e| e.in_op(format!("remove {} from {}", identifier, bucket)))
    }

    /// Keep the `keep` newest records and delete the rest.
    pub fn remove_old<R: Record>(&self, bucket: &str, keep: usize) -> FeederResult<Vec<RemovedRecord>> {
        let result = (|| -> FeederResult<Vec<RemovedRecord>> {
            let txn = self.db.begin_write()?;
            if !has_bucket(&txn, bucket)? {
                txn.abort()?;
                return Err(FeederError::NoBucket(bucket.to_string()));
            }

            let removed = {
                let mut table = txn.open_table(bucket_def(bucket))?;
                let doomed = table
                    .iter()?
                    .rev()
                    .skip(keep)
                    .map(|row| row.map(|(k, v)| (k.value().to_string(), v.value().to_vec())))
                    .collect::<Result<Vec<_>, _>>()?;

                let mut removed = Vec::with_capacity(doomed.len());
                for (key, value) in doomed {
                    table.remove(key.as_str())?;
                    let (identifier, file) = match serde_json::from_slice::<R>(&value) {
                        Ok(record) => (
                            record.identifier().to_string(),
                            record.attached_file().map(str::to_string),
                        ),
                        Err(e) => {
                            warn!(bucket, key = %key, "removing undecodable record: {}", e);
                            (String::new(), None)
                        }
                    };
                    removed.push(RemovedRecord {
                        key,
                        identifier,
                        file,
                    });
                }
                removed
            };
            txn.commit()?;
            Ok(removed)
        })();

        if let Ok(removed) = &result {
            if !removed.is_empty() {
                debug!(bucket, keep, removed = removed.len(), "trimmed bucket");
            }
        }
        result.map_err(|e| e.in_op(format!("remove old from {}", bucket)))
    }

    /// Rewrite a stored record in place, keeping its key.
    pub fn modify<R, F>(&self, bucket: &str, identifier: &str, f: F) -> FeederResult<()>
    where
        R: Record,
        F: FnOnce(&mut R),
    {
        let result = (|| -> FeederResult<()> {
            let txn = self.db.begin_write()?;
            if !has_bucket(&txn, bucket)? {
                txn.abort()?;
                return Err(FeederError::NoBucket(bucket.to_string()));
            }

            let updated = {
                let mut table = txn.open_table(bucket_def(bucket))?;
                let mut found = None;
                for row in table.iter()?.rev() {
                    let (key, value) = row?;
                    if let Ok(record) = serde_json::from_slice::<R>(value.value()) {
                        if record.identifier() == identifier {
                            found = Some((key.value().to_string(), record));
                            break;
                        }
                    }
                }
                match found {
                    Some((key, mut record)) => {
                        f(&mut record);
                        let data = serde_json::to_vec(&record)?;
                        table.insert(key.as_str(), data.as_slice())?;
                        true
                    }
                    None => false,
                }
            };

            if !updated {
                txn.abort()?;
                return Err(FeederError::RecordNotFound {
                    bucket: bucket.to_string(),
                    id: identifier.to_string(),
                });
            }
            txn.commit()?;
            Ok(())
        })();

        result.map_err(|e| e.in_op(format!("update {} in {}", identifier, bucket)))
    }

    /// Bucket names, sorted, without internal tables.
    pub fn buckets(&self) -> FeederResult<Vec<String>> {
        let result = (|| -> FeederResult<Vec<String>> {
            let txn = self.db.begin_read()?;
            let mut names: Vec<String> = txn
                .list_tables()?
                .map(|handle| handle.name().to_string())
                .filter(|name| !name.starts_with(INTERNAL_BUCKET_PREFIX))
                .collect();
            names.sort();
            Ok(names)
        })();

        result.map_err(|e| e.in_op("list buckets"))
    }

    pub fn count(&self, bucket: &str) -> FeederResult<usize> {
        let result = (|| -> FeederResult<usize> {
            let txn = self.db.begin_read()?;
            let table = match txn.open_table(bucket_def(bucket)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => {
                    return Err(FeederError::NoBucket(bucket.to_string()))
                }
                Err(e) => return Err(e.into()),
            };
            Ok(table.len()? as usize)
        })();

        result.map_err(|e| e.in_op(format!("count {}", bucket)))
    }

    /// Set a marker unless one already exists.
    pub(crate) fn put_marker(&self, key: &str, value: &str) -> FeederResult<()> {
        let result = (|| -> FeederResult<()> {
            let txn = self.db.begin_write()?;
            {
                let mut table = txn.open_table(bucket_def(MARKERS_TABLE))?;
                if table.get(key)?.is_none() {
                    table.insert(key, value.as_bytes())?;
                }
            }
            txn.commit()?;
            Ok(())
        })();

        result.map_err(|e| e.in_op("set marker"))
    }

    pub(crate) fn get_marker(&self, key: &str) -> FeederResult<Option<String>> {
        let result = (|| -> FeederResult<Option<String>> {
            let txn = self.db.begin_read()?;
            let table = match txn.open_table(bucket_def(MARKERS_TABLE)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let value = table
                .get(key)?
                .map(|v| String::from_utf8_lossy(v.value()).into_owned());
            Ok(value)
        })();

        result.map_err(|e| e.in_op("get marker"))
    }

    pub(crate) fn delete_marker(&self, key: &str) -> FeederResult<()> {
        let result = (|| -> FeederResult<()> {
            let txn = self.db.begin_write()?;
            {
                let mut table = txn.open_table(bucket_def(MARKERS_TABLE))?;
                table.remove(key)?;
            }
            txn.commit()?;
            Ok(())
        })();

        result.map_err(|e| e.in_op("reset marker"))
    }

    pub(crate) fn count_markers(&self) -> FeederResult<usize> {
        match self.count(MARKERS_TABLE) {
            Err(FeederError::NoBucket(_)) => Ok(0),
            other => other,
        }
    }
}
