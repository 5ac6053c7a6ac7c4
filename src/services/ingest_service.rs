use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::domain::{Notification, Source};
use crate::errors::{FeederError, FeederResult};
use crate::services::blocking;
use crate::services::notification_service::Notifier;
use crate::sources::traits::FeedFetcher;
use crate::storage::traits::ItemRepository;

/// Items older than this are never stored.
const MAX_ITEM_AGE_DAYS: i64 = 365;

/// Outcome of one pass over every configured source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub sources: usize,
    pub failed: usize,
    pub created: usize,
}

impl CycleStats {
    fn merge(&mut self, other: CycleStats) {
        self.sources += other.sources;
        self.failed += other.failed;
        self.created += other.created;
    }
}

struct FeedPlan {
    name: String,
    title: String,
    notify_channel: String,
    filter: Option<Regex>,
    keep: usize,
    sources: Vec<Source>,
}

struct Job {
    feed: Arc<FeedPlan>,
    source: Source,
}

/// Polls every plain feed source on a fixed pool of workers.
pub struct IngestService<F, R, N> {
    fetcher: Arc<F>,
    items: Arc<R>,
    notifier: Arc<N>,
    feeds: Vec<Arc<FeedPlan>>,
    concurrent: usize,
    max_items: usize,
    interval: Duration,
}

impl<F, R, N> IngestService<F, R, N>
where
    F: FeedFetcher + 'static,
    R: ItemRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(config: &Config, fetcher: F, items: R, notifier: N) -> FeederResult<Self> {
        if config.system.concurrent == 0 {
            return Err(FeederError::Config(
                "ingest needs at least one worker".to_string(),
            ));
        }

        let feeds = config
            .feeds
            .iter()
            .map(|(name, feed)| {
                let filter = feed.filter_title.as_deref().and_then(|pattern| {
                    Regex::new(pattern)
                        .map_err(|e| warn!(feed = %name, "invalid filter_title ignored: {}", e))
                        .ok()
                });
                let title = if feed.title.is_empty() {
                    name.clone()
                } else {
                    feed.title.clone()
                };

                Arc::new(FeedPlan {
                    name: name.clone(),
                    title,
                    notify_channel: feed.notify_channel.clone(),
                    filter,
                    keep: config.feed_keep(feed),
                    sources: feed.sources.clone(),
                })
            })
            .collect();

        Ok(Self {
            fetcher: Arc::new(fetcher),
            items: Arc::new(items),
            notifier: Arc::new(notifier),
            feeds,
            concurrent: config.system.concurrent,
            max_items: config.system.max_items_per_source,
            interval: config.system.update_interval(),
        })
    }

    /// Poll, trim and sleep until cancelled.
    pub async fn run(&self, token: CancellationToken) -> FeederResult<()> {
        info!(
            feeds = self.feeds.len(),
            concurrent = self.concurrent,
            interval_secs = self.interval.as_secs(),
            "ingest service started"
        );

        loop {
            tokio::select! {
                stats = self.run_cycle() => {
                    info!(
                        sources = stats.sources,
                        failed = stats.failed,
                        created = stats.created,
                        "ingest cycle finished"
                    );
                }
                _ = token.cancelled() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = token.cancelled() => break,
            }
        }

        info!("ingest service stopped");
        Err(FeederError::Cancelled)
    }

    /// One pass over all sources followed by per-feed retention.
    pub async fn run_cycle(&self) -> CycleStats {
        let (tx, rx) = mpsc::unbounded_channel();
        for feed in &self.feeds {
            for source in &feed.sources {
                let job = Job {
                    feed: Arc::clone(feed),
                    source: source.clone(),
                };
                if tx.send(job).is_err() {
                    break;
                }
            }
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();
        for _ in 0..self.concurrent {
            let rx = Arc::clone(&rx);
            let fetcher = Arc::clone(&self.fetcher);
            let items = Arc::clone(&self.items);
            let notifier = Arc::clone(&self.notifier);
            let max_items = self.max_items;

            workers.spawn(async move {
                let mut stats = CycleStats::default();
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else { break };

                    stats.sources += 1;
                    let span = info_span!("feed", feed = %job.feed.name, source = %job.source.url);
                    match process(&job, &*fetcher, &items, &*notifier, max_items)
                        .instrument(span)
                        .await
                    {
                        Ok(created) => stats.created += created,
                        Err(e) => {
                            stats.failed += 1;
                            warn!(feed = %job.feed.name, source = %job.source.url, "failed to process source: {}", e);
                        }
                    }
                }
                stats
            });
        }

        let mut total = CycleStats::default();
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(stats) => total.merge(stats),
                Err(e) => error!("ingest worker failed: {}", e),
            }
        }

        self.retain().await;
        total
    }

    async fn retain(&self) {
        for feed in &self.feeds {
            let items = Arc::clone(&self.items);
            let (name, keep) = (feed.name.clone(), feed.keep);
            match blocking(move || items.remove_old(&name, keep)).await {
                Ok(removed) if !removed.is_empty() => {
                    info!(feed = %feed.name, keep = feed.keep, removed = removed.len(), "trimmed feed")
                }
                Ok(_) => {}
                Err(e) => warn!(feed = %feed.name, "retention failed: {}", e),
            }
        }
    }
}

/// Fetch one source and store what is new. Returns the number of created items.
async fn process<F, R, N>(
    job: &Job,
    fetcher: &F,
    items: &Arc<R>,
    notifier: &N,
    max_items: usize,
) -> FeederResult<usize>
where
    F: FeedFetcher + ?Sized,
    R: ItemRepository + 'static,
    N: Notifier + ?Sized,
{
    let mut fetched = fetcher.fetch(&job.source.url).await?;
    // newest first, unresolved dates last
    fetched.sort_by(|a, b| b.dt.cmp(&a.dt));

    let oldest = Utc::now() - chrono::Duration::days(MAX_ITEM_AGE_DAYS);
    let feed = &job.feed;
    let mut created = 0;

    for item in fetched.into_iter().take(max_items) {
        if item.dt.is_some_and(|dt| dt < oldest) {
            debug!(guid = %item.guid, "too old, skipped");
            continue;
        }
        if feed.filter.as_ref().is_some_and(|re| re.is_match(&item.title)) {
            debug!(title = %item.title, "filtered out");
            continue;
        }

        let saved = {
            let (items, name, item) = (Arc::clone(items), feed.name.clone(), item.clone());
            blocking(move || items.save(&name, &item)).await
        };
        match saved {
            Ok(true) => {
                created += 1;
                info!(title = %item.title, "new item");
                let notification = Notification::from_item(&feed.title, &item);
                if let Err(e) = notifier.send(&feed.notify_channel, &notification).await {
                    warn!(title = %item.title, "notification failed: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!(guid = %item.guid, "failed to save item: {}", e),
        }
    }

    Ok(created)
}
