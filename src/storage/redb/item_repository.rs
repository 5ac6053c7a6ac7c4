use crate::domain::Item;
use crate::errors::FeederResult;
use crate::storage::record::RemovedRecord;
use crate::storage::redb::RedbStorage;
use crate::storage::traits::ItemRepository;

pub struct RedbItemRepository {
    storage: RedbStorage,
}

impl RedbItemRepository {
    pub fn new(storage: RedbStorage) -> Self {
        Self { storage }
    }
}

impl ItemRepository for RedbItemRepository {
    fn save(&self, feed: &str, item: &Item) -> FeederResult<bool> {
        self.storage.save(feed, item)
    }

    fn load(&self, feed: &str, max: usize, skip_junk: bool) -> FeederResult<Vec<Item>> {
        self.storage.load(feed, max, skip_junk)
    }

    fn exist(&self, feed: &str, item: &Item) -> FeederResult<bool> {
        self.storage.exist(feed, item)
    }

    fn remove(&self, feed: &str, guid: &str) -> FeederResult<RemovedRecord> {
        self.storage.remove::<Item>(feed, guid)
    }

    fn remove_old(&self, feed: &str, keep: usize) -> FeederResult<Vec<RemovedRecord>> {
        self.storage.remove_old::<Item>(feed, keep)
    }

    fn buckets(&self) -> FeederResult<Vec<String>> {
        self.storage.buckets()
    }

    fn set_junk(&self, feed: &str, guid: &str, junk: bool) -> FeederResult<()> {
        self.storage.modify(feed, guid, |item: &mut Item| item.junk = junk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FeederError;
    use chrono::{Duration, TimeZone, Utc};

    fn setup_repo() -> RedbItemRepository {
        let storage = RedbStorage::in_memory().unwrap();
        RedbItemRepository::new(storage)
    }

    fn item(guid: &str, minutes: i64) -> Item {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Item::new(guid.to_string(), format!("Item {}", guid))
            .with_link(format!("https://example.com/{}", guid))
            .with_description(format!("Description {}", guid))
            .with_dt(base + Duration::minutes(minutes))
    }

    #[test]
    fn test_save_and_load_item() {
        let repo = setup_repo();
        let item = item("1", 0).with_author("Umputun".to_string());

        assert!(repo.save("radio-t", &item).unwrap());

        let loaded = repo.load("radio-t", 10, false).unwrap();
        assert_eq!(loaded, vec![item]);
    }

    #[test]
    fn test_duplicate_save_keeps_first_payload() {
        let repo = setup_repo();
        let first = item("1", 0);
        let mut second = first.clone();
        second.title = "Changed".to_string();
        second.description = "Changed too".to_string();

        assert!(repo.save("radio-t", &first).unwrap());
        assert!(!repo.save("radio-t", &second).unwrap());

        let loaded = repo.load("radio-t", 10, false).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Item 1");
        assert_eq!(loaded[0].description, "Description 1");
    }

    #[test]
    fn test_load_is_newest_first() {
        let repo = setup_repo();
        // saved out of order on purpose
        for minutes in [5, 1, 9, 3, 7] {
            repo.save("radio-t", &item(&minutes.to_string(), minutes)).unwrap();
        }

        let guids: Vec<String> = repo
            .load("radio-t", 10, false)
            .unwrap()
            .into_iter()
            .map(|i| i.guid)
            .collect();
        assert_eq!(guids, vec!["9", "7", "5", "3", "1"]);
    }

    #[test]
    fn test_load_respects_max() {
        let repo = setup_repo();
        for i in 0..5 {
            repo.save("radio-t", &item(&i.to_string(), i)).unwrap();
        }

        let loaded = repo.load("radio-t", 2, false).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].guid, "4");
        assert_eq!(loaded[1].guid, "3");

        assert!(repo.load("radio-t", 0, false).unwrap().is_empty());
    }

    #[test]
    fn test_load_unknown_bucket() {
        let repo = setup_repo();
        let result = repo.load("nope", 10, false);
        assert!(matches!(result, Err(FeederError::NoBucket(_))));
    }

    #[test]
    fn test_load_skips_junk() {
        let repo = setup_repo();
        for i in 0..4 {
            repo.save("radio-t", &item(&i.to_string(), i)).unwrap();
        }
        repo.set_junk("radio-t", "3", true).unwrap();
        repo.set_junk("radio-t", "1", true).unwrap();

        let clean: Vec<String> = repo
            .load("radio-t", 2, true)
            .unwrap()
            .into_iter()
            .map(|i| i.guid)
            .collect();
        assert_eq!(clean, vec!["2", "0"]);

        let all = repo.load("radio-t", 10, false).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all[0].junk);
    }

    #[test]
    fn test_set_junk_unknown_item() {
        let repo = setup_repo();
        repo.save("radio-t", &item("1", 0)).unwrap();

        let result = repo.set_junk("radio-t", "2", true);
        assert!(matches!(result, Err(FeederError::RecordNotFound { .. })));
    }

    #[test]
    fn test_remove_old_keeps_newest() {
        let repo = setup_repo();
        for i in 0..7 {
            repo.save("radio-t", &item(&i.to_string(), i)).unwrap();
        }

        let removed = repo.remove_old("radio-t", 3).unwrap();
        assert_eq!(removed.len(), 4);
        let mut removed_ids: Vec<String> = removed.into_iter().map(|r| r.identifier).collect();
        removed_ids.sort();
        assert_eq!(removed_ids, vec!["0", "1", "2", "3"]);

        let kept: Vec<String> = repo
            .load("radio-t", 10, false)
            .unwrap()
            .into_iter()
            .map(|i| i.guid)
            .collect();
        assert_eq!(kept, vec!["6", "5", "4"]);
    }

    #[test]
    fn test_remove_old_below_limit() {
        let repo = setup_repo();
        repo.save("radio-t", &item("1", 0)).unwrap();

        assert!(repo.remove_old("radio-t", 5).unwrap().is_empty());
        assert_eq!(repo.load("radio-t", 10, false).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_old_unknown_bucket() {
        let repo = setup_repo();
        let result = repo.remove_old("nope", 5);
        assert!(matches!(result, Err(FeederError::NoBucket(_))));
    }

    #[test]
    fn test_exist() {
        let repo = setup_repo();
        let item = item("1", 0);

        assert!(!repo.exist("radio-t", &item).unwrap());
        repo.save("radio-t", &item).unwrap();
        assert!(repo.exist("radio-t", &item).unwrap());
    }

    #[test]
    fn test_exist_does_not_create_bucket() {
        let repo = setup_repo();

        assert!(!repo.exist("ghost", &item("1", 0)).unwrap());
        assert!(repo.buckets().unwrap().is_empty());
    }

    #[test]
    fn test_remove_by_guid() {
        let repo = setup_repo();
        repo.save("radio-t", &item("1", 0)).unwrap();
        repo.save("radio-t", &item("2", 1)).unwrap();

        let removed = repo.remove("radio-t", "1").unwrap();
        assert_eq!(removed.identifier, "1");
        assert_eq!(removed.file, None);

        let left = repo.load("radio-t", 10, false).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].guid, "2");
    }

    #[test]
    fn test_remove_missing() {
        let repo = setup_repo();
        repo.save("radio-t", &item("1", 0)).unwrap();

        assert!(matches!(
            repo.remove("radio-t", "42"),
            Err(FeederError::RecordNotFound { .. })
        ));
        assert!(matches!(
            repo.remove("nope", "1"),
            Err(FeederError::NoBucket(_))
        ));
    }

    #[test]
    fn test_buckets_sorted() {
        let repo = setup_repo();
        repo.save("zebra", &item("1", 0)).unwrap();
        repo.save("alpha", &item("1", 0)).unwrap();
        repo.save("radio-t", &item("1", 0)).unwrap();

        assert_eq!(repo.buckets().unwrap(), vec!["alpha", "radio-t", "zebra"]);
    }

    #[test]
    fn test_radio_t_scenario() {
        let repo = setup_repo();
        let first = Item::new("1".to_string(), "Радио-Т 900".to_string())
            .with_pub_date("Sat, 10 Feb 2024 20:00:00 +0000".to_string());
        let second = Item::new("2".to_string(), "Радио-Т 901".to_string())
            .with_pub_date("Sat, 17 Feb 2024 20:00:00 +0000".to_string());

        assert!(repo.save("radio-t", &first).unwrap());
        assert!(repo.save("radio-t", &second).unwrap());

        let loaded = repo.load("radio-t", 10, false).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].guid, "2");
        assert_eq!(loaded[1].guid, "1");
    }

    #[test]
    fn test_unparseable_date_is_not_stored() {
        let repo = setup_repo();
        let item = Item::new("1".to_string(), "Broken".to_string())
            .with_pub_date("100500".to_string());

        let result = repo.save("radio-t", &item);
        assert!(matches!(result, Err(FeederError::InvalidTimestamp(_))));
        assert!(repo.buckets().unwrap().is_empty());
    }
}
