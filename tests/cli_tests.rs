use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Point config and store at a scratch directory so the user's files are never touched.
fn keeper_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("feed-keeper").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("--db")
        .arg(dir.path().join("test.db"))
        .env_remove("RUST_LOG")
        .env_remove("NOTEBROOK_URL")
        .env_remove("NOTEBROOK_TOKEN");
    cmd
}

#[test]
fn test_run_help_shows_once_flag() {
    Command::cargo_bin("feed-keeper")
        .unwrap()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--once"));
}

#[test]
fn test_buckets_on_fresh_store() {
    let dir = TempDir::new().unwrap();

    keeper_cmd(&dir)
        .arg("buckets")
        .assert()
        .success()
        .stdout(predicate::str::contains("No buckets."));
}

#[test]
fn test_show_missing_bucket_fails() {
    let dir = TempDir::new().unwrap();

    keeper_cmd(&dir)
        .arg("show")
        .arg("radio-t")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No bucket for radio-t"));
}

#[test]
fn test_remove_missing_bucket_fails() {
    let dir = TempDir::new().unwrap();

    keeper_cmd(&dir)
        .arg("remove")
        .arg("radio-t")
        .arg("guid-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No bucket"));
}

#[test]
fn test_trim_requires_keep() {
    let dir = TempDir::new().unwrap();

    keeper_cmd(&dir)
        .arg("trim")
        .arg("radio-t")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--keep"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("feeder.toml");
    std::fs::write(&config, "[system]\nconcurrent = \"many\"\n").unwrap();

    Command::cargo_bin("feed-keeper")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(dir.path().join("test.db"))
        .arg("buckets")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_run_once_without_feeds() {
    let dir = TempDir::new().unwrap();

    keeper_cmd(&dir)
        .arg("run")
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::contains("Feeds: 0 sources"))
        .stdout(predicate::str::contains("YouTube: 0 entries"));
}

#[test]
fn test_remove_channel_entry_clears_marker() {
    use chrono::{TimeZone, Utc};
    use feed_keeper::domain::Entry;
    use feed_keeper::storage::{EntryRepository, RedbEntryRepository, RedbStorage};

    let dir = TempDir::new().unwrap();
    let config = dir.path().join("feeder.toml");
    std::fs::write(&config, "[[youtube.channels]]\nid = \"UC1\"\nname = \"Tech Talks\"\n").unwrap();
    let db = dir.path().join("test.db");

    let entry = Entry::new("UC1", "vid1", "Video 1", Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
    {
        let repo = RedbEntryRepository::new(RedbStorage::new(&db).unwrap());
        repo.save(&entry).unwrap();
        repo.set_processed(&entry).unwrap();
    }

    Command::cargo_bin("feed-keeper")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .arg("remove")
        .arg("UC1")
        .arg("vid1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed:"));

    let repo = RedbEntryRepository::new(RedbStorage::new(&db).unwrap());
    assert!(!repo.exist(&entry).unwrap());
    assert_eq!(repo.check_processed(&entry).unwrap(), None);
}
