use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use feed_keeper::cli::{Cli, Commands};
use feed_keeper::config::Config;
use feed_keeper::domain::{Entry, Item};
use feed_keeper::errors::{FeederError, FeederResult};
use feed_keeper::services::{IngestService, NotificationService, YouTubeService};
use feed_keeper::sources::{CommandDownloader, Mp3Duration, RssAtomSource, YouTubeSource};
use feed_keeper::storage::{
    EntryRepository, ItemRepository, RedbEntryRepository, RedbItemRepository, RedbStorage,
    RemovedRecord,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> FeederResult<()> {
    // .env has to be loaded before clap reads the environment
    Config::load_env();
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = Config::load(&cli.config)?;
    let db_path = cli.db.clone().unwrap_or_else(Config::default_db_path);
    let storage = RedbStorage::new(&db_path)?;

    match cli.command {
        Commands::Run { once } => cmd_run(&config, storage, once).await,
        Commands::Buckets => cmd_buckets(&storage),
        Commands::Show {
            bucket,
            max,
            skip_junk,
        } => cmd_show(&config, &storage, &bucket, max, skip_junk),
        Commands::Remove { bucket, id } => cmd_remove(&config, &storage, &bucket, &id).await,
        Commands::Trim { bucket, keep } => cmd_trim(&config, &storage, &bucket, keep).await,
    }
}

async fn cmd_run(config: &Config, storage: RedbStorage, once: bool) -> FeederResult<()> {
    let notifier = NotificationService::new(&config.notebrook)?;
    let ingest = IngestService::new(
        config,
        RssAtomSource::new(),
        RedbItemRepository::new(storage.clone()),
        notifier,
    )?;
    let youtube = YouTubeService::new(
        config,
        YouTubeSource::new(
            config.youtube.channel_base_url.as_str(),
            config.youtube.playlist_base_url.as_str(),
        ),
        CommandDownloader::new(
            config.youtube.dl_template.as_str(),
            config.youtube.files_location.as_str(),
        ),
        RedbEntryRepository::new(storage),
        Mp3Duration,
    )?;

    let token = CancellationToken::new();

    if once {
        let plain = ingest.run_cycle().await;
        println!(
            "Feeds: {} sources, {} failed, {} new items",
            plain.sources, plain.failed, plain.created
        );
        let channels = youtube.run_cycle(&token).await?;
        println!(
            "YouTube: {} entries, {} added, {} removed",
            channels.entries, channels.added, channels.removed
        );
        return Ok(());
    }

    let signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            signal.cancel();
        }
    });

    let feeds = ingest.run(token.clone());
    let channels = async {
        let result = youtube.run(token.clone()).await;
        if let Err(e) = &result {
            if !matches!(e, FeederError::Cancelled) {
                error!("youtube service failed: {}", e);
                token.cancel();
            }
        }
        result
    };

    let (feeds, channels) = tokio::join!(feeds, channels);
    for result in [feeds, channels] {
        match result {
            Ok(()) | Err(FeederError::Cancelled) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn cmd_buckets(storage: &RedbStorage) -> FeederResult<()> {
    let buckets = storage.buckets()?;

    if buckets.is_empty() {
        println!("No buckets.");
        return Ok(());
    }

    for bucket in buckets {
        println!("{}\t{}", bucket, storage.count(&bucket)?);
    }
    Ok(())
}

/// Configured YouTube channels hold entries, everything else holds items.
fn is_channel(config: &Config, bucket: &str) -> bool {
    config.youtube_channel(bucket).is_some()
}

fn cmd_show(
    config: &Config,
    storage: &RedbStorage,
    bucket: &str,
    max: usize,
    skip_junk: bool,
) -> FeederResult<()> {
    if is_channel(config, bucket) {
        let entries = RedbEntryRepository::new(storage.clone()).load(bucket, max)?;
        print_entries(&entries);
        return Ok(());
    }

    let items = RedbItemRepository::new(storage.clone()).load(bucket, max, skip_junk)?;
    if items.is_empty() && storage.count(bucket)? > 0 {
        // not configured here, but the records decode as entries
        let entries = RedbEntryRepository::new(storage.clone()).load(bucket, max)?;
        print_entries(&entries);
        return Ok(());
    }

    if items.is_empty() {
        println!("No items in {}.", bucket);
        return Ok(());
    }
    for item in items {
        print_item(&item);
    }
    Ok(())
}

fn print_item(item: &Item) {
    let junk = if item.junk { " (junk)" } else { "" };
    println!("  {}{} [{}]", item.title, junk, item.pub_date);
    if !item.link.is_empty() {
        println!("    {}", item.link);
    }
    if !item.enclosure.url.is_empty() {
        println!("    {} ({} bytes)", item.enclosure.url, item.enclosure.length);
    }
}

fn print_entries(entries: &[Entry]) {
    for entry in entries {
        println!("  {} [{}]", entry.title, entry.published.to_rfc3339());
        println!("    {}", entry.link);
        if !entry.file.is_empty() {
            println!("    {}", entry.file);
        }
    }
}

async fn delete_files(removed: &[RemovedRecord]) {
    for file in removed.iter().filter_map(|r| r.file.as_deref()) {
        if let Err(e) = tokio::fs::remove_file(file).await {
            warn!(file, "failed to remove file: {}", e);
        }
    }
}

async fn cmd_remove(config: &Config, storage: &RedbStorage, bucket: &str, id: &str) -> FeederResult<()> {
    let removed = if is_channel(config, bucket) {
        let entries = RedbEntryRepository::new(storage.clone());
        // markers are keyed by channel and video only, so the next cycle may fetch it again
        entries.reset_processed(&Entry::new(bucket, id, "", Utc::now()))?;
        entries.remove(bucket, id)?
    } else {
        RedbItemRepository::new(storage.clone()).remove(bucket, id)?
    };

    delete_files(std::slice::from_ref(&removed)).await;
    println!("Removed: {}", removed.identifier);
    Ok(())
}

async fn cmd_trim(config: &Config, storage: &RedbStorage, bucket: &str, keep: usize) -> FeederResult<()> {
    let removed = if is_channel(config, bucket) {
        RedbEntryRepository::new(storage.clone()).remove_old(bucket, keep)?
    } else {
        RedbItemRepository::new(storage.clone()).remove_old(bucket, keep)?
    };

    delete_files(&removed).await;
    println!("Removed {} records from {}, kept up to {}.", removed.len(), bucket, keep);
    Ok(())
}
