use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{ChannelKind, Entry};
use crate::errors::{FeederError, FeederResult};
use crate::services::blocking;
use crate::sources::downloader::run_update;
use crate::sources::traits::{ChannelService, Downloader, DurationService};
use crate::storage::traits::EntryRepository;

/// Entries published more recently than this get the download time as their
/// publish time, so a late upload does not land below newer episodes.
const FRESH_ENTRY_HOURS: i64 = 24;

/// Counters for one pass over all channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub entries: usize,
    /// Filtered out, too short, too old or failed to download
    pub ignored: usize,
    /// Already known
    pub skipped: usize,
    pub added: usize,
    pub removed: usize,
}

impl ChannelStats {
    fn merge(&mut self, other: ChannelStats) {
        self.entries += other.entries;
        self.ignored += other.ignored;
        self.skipped += other.skipped;
        self.added += other.added;
        self.removed += other.removed;
    }
}

struct ChannelPlan {
    id: String,
    name: String,
    kind: ChannelKind,
    keep: usize,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl ChannelPlan {
    fn allows(&self, title: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(title) {
                return false;
            }
        }
        !self.exclude.as_ref().is_some_and(|re| re.is_match(title))
    }
}

fn compile(pattern: Option<&str>, channel: &str) -> FeederResult<Option<Regex>> {
    pattern
        .filter(|p| !p.is_empty())
        .map(|p| {
            Regex::new(p).map_err(|e| {
                FeederError::Config(format!("bad filter {:?} for channel {}: {}", p, channel, e))
            })
        })
        .transpose()
}

/// Periodic downloader self-update, checked on every tick after the first.
struct UpdateSchedule {
    command: String,
    every: Duration,
    last: Instant,
}

impl UpdateSchedule {
    fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) < self.every {
            return false;
        }
        self.last = now;
        true
    }
}

/// Attach the downloaded file and adjust the entry before it is stored.
fn apply_download(entry: &mut Entry, channel: &ChannelPlan, file: String, duration: u32, now: DateTime<Utc>) {
    entry.file = file;
    entry.duration = duration;

    if now - entry.published < chrono::Duration::hours(FRESH_ENTRY_HOURS) {
        debug!(video = %entry.video_id, from = %entry.published.to_rfc3339(), "reset published time");
        entry.published = now;
    }
    if !channel.name.is_empty() && !entry.title.contains(&channel.name) {
        entry.title = format!("{}: {}", channel.name, entry.title);
    }
}

async fn discard(file: &str) {
    if let Err(e) = tokio::fs::remove_file(file).await {
        warn!(file, "failed to remove file: {}", e);
    }
}

/// Downloads audio for new channel entries and keeps each channel bounded.
pub struct YouTubeService<C, D, R, S> {
    lister: C,
    downloader: D,
    entries: Arc<R>,
    durations: Arc<S>,
    channels: Vec<ChannelPlan>,
    interval: Duration,
    skip_shorts: u32,
    update: Option<(String, Duration)>,
}

impl<C, D, R, S> YouTubeService<C, D, R, S>
where
    C: ChannelService,
    D: Downloader,
    R: EntryRepository + 'static,
    S: DurationService + 'static,
{
    pub fn new(config: &Config, lister: C, downloader: D, entries: R, durations: S) -> FeederResult<Self> {
        let channels = config
            .youtube
            .channels
            .iter()
            .map(|c| {
                Ok(ChannelPlan {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    kind: c.kind,
                    keep: c.keep.unwrap_or(config.youtube.keep_per_channel),
                    include: compile(c.include.as_deref(), &c.id)?,
                    exclude: compile(c.exclude.as_deref(), &c.id)?,
                })
            })
            .collect::<FeederResult<Vec<_>>>()?;

        Ok(Self {
            lister,
            downloader,
            entries: Arc::new(entries),
            durations: Arc::new(durations),
            channels,
            interval: config.youtube_interval(),
            skip_shorts: u32::try_from(config.youtube.skip_shorts_secs).unwrap_or(u32::MAX),
            update: config
                .ytdlp_update()
                .map(|(command, every)| (command.to_string(), every)),
        })
    }

    /// One pass right away, then one per interval, until cancelled or a
    /// listing or store error.
    pub async fn run(&self, token: CancellationToken) -> FeederResult<()> {
        info!(
            channels = self.channels.len(),
            interval_secs = self.interval.as_secs(),
            skip_shorts_secs = self.skip_shorts,
            "youtube service started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut schedule = self.update.as_ref().map(|(command, every)| UpdateSchedule {
            command: command.clone(),
            every: *every,
            last: Instant::now(),
        });

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = token.cancelled() => break,
            }

            if let Some(schedule) = schedule.as_mut() {
                if schedule.due(Instant::now()) {
                    tokio::select! {
                        result = run_update(&schedule.command) => {
                            if let Err(e) = result {
                                warn!("downloader update failed: {}", e);
                            }
                        }
                        _ = token.cancelled() => break,
                    }
                }
            }

            let stats = self.run_cycle(&token).await?;
            info!(
                entries = stats.entries,
                added = stats.added,
                skipped = stats.skipped,
                ignored = stats.ignored,
                removed = stats.removed,
                "youtube cycle finished"
            );
        }

        info!("youtube service stopped");
        Err(FeederError::Cancelled)
    }

    /// Process every channel in order.
    pub async fn run_cycle(&self, token: &CancellationToken) -> FeederResult<ChannelStats> {
        let mut total = ChannelStats::default();
        for channel in &self.channels {
            let span = info_span!("channel", id = %channel.id, name = %channel.name);
            let stats = self.process_channel(channel, token).instrument(span).await?;
            total.merge(stats);
        }
        Ok(total)
    }

    async fn process_channel(
        &self,
        channel: &ChannelPlan,
        token: &CancellationToken,
    ) -> FeederResult<ChannelStats> {
        let listed = self.lister.get(&channel.id, channel.kind).await?;
        info!(entries = listed.len(), keep = channel.keep, "listed channel");

        let mut stats = ChannelStats::default();
        let mut accounted = 0;

        for mut entry in listed {
            if token.is_cancelled() {
                return Err(FeederError::Cancelled);
            }

            stats.entries += 1;
            if accounted >= channel.keep {
                break;
            }
            if !channel.allows(&entry.title) {
                debug!(video = %entry.video_id, title = %entry.title, "filtered out");
                stats.ignored += 1;
                continue;
            }
            if self.is_known(&entry).await? {
                stats.skipped += 1;
                accounted += 1;
                continue;
            }
            if self.older_than_kept(&entry).await? {
                info!(video = %entry.video_id, published = %entry.published.to_rfc3339(), "older than everything kept, skipping");
                stats.ignored += 1;
                self.mark_processed(&entry).await;
                continue;
            }

            info!(video = %entry.video_id, title = %entry.title, "new entry");
            let file_name = Uuid::new_v4().to_string();
            let download = tokio::select! {
                result = self.downloader.get(&entry.video_id, &file_name) => result,
                _ = token.cancelled() => return Err(FeederError::Cancelled),
            };
            let download = match download {
                Ok(download) => download,
                Err(FeederError::DownloadSkipped(reason)) => {
                    info!(video = %entry.video_id, "skipping: {}", reason);
                    stats.ignored += 1;
                    continue;
                }
                Err(e) => {
                    warn!(video = %entry.video_id, "failed to download: {}", e);
                    stats.ignored += 1;
                    continue;
                }
            };

            let duration = self.duration_of(&download.file).await;
            if self.skip_shorts > 0 && duration > 0 && duration < self.skip_shorts {
                info!(video = %entry.video_id, duration, "skipping short file");
                stats.ignored += 1;
                self.mark_processed(&entry).await;
                discard(&download.file).await;
                continue;
            }

            accounted += 1;
            apply_download(&mut entry, channel, download.file, duration, Utc::now());

            let saved = {
                let entry = entry.clone();
                self.store(move |entries| entries.save(&entry)).await
            };
            match saved {
                Ok(true) => {}
                Ok(false) => {
                    warn!(video = %entry.video_id, "entry was already stored");
                    discard(&entry.file).await;
                    self.mark_processed(&entry).await;
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    discard(&entry.file).await;
                    return Err(e);
                }
            }
            self.mark_processed(&entry).await;
            info!(video = %entry.video_id, file = %entry.file, duration = entry.duration, "saved entry");
            stats.added += 1;
        }

        if stats.added > 0 {
            stats.removed = self.remove_old(channel).await;
        }
        Ok(stats)
    }

    async fn store<T, F>(&self, f: F) -> FeederResult<T>
    where
        F: FnOnce(&R) -> FeederResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        blocking(move || f(&entries)).await
    }

    async fn is_known(&self, entry: &Entry) -> FeederResult<bool> {
        let entry = entry.clone();
        self.store(move |entries| {
            Ok(entries.exist(&entry)? || entries.check_processed(&entry)?.is_some())
        })
        .await
    }

    /// Every channel holds its full quota and `entry` predates all of it,
    /// which happens when a channel is first loaded with its back catalog.
    async fn older_than_kept(&self, entry: &Entry) -> FeederResult<bool> {
        let quotas: Vec<(String, usize)> = self.channels.iter().map(|c| (c.id.clone(), c.keep)).collect();
        let capacity: usize = quotas.iter().map(|(_, keep)| keep).sum();
        let published = entry.published;

        self.store(move |entries| {
            let mut count = 0;
            let mut oldest: Option<DateTime<Utc>> = None;
            for (id, keep) in &quotas {
                let kept = match entries.load(id, *keep) {
                    Ok(kept) => kept,
                    Err(FeederError::NoBucket(_)) => continue,
                    Err(e) => return Err(e),
                };
                count += kept.len();
                oldest = kept.iter().map(|e| e.published).chain(oldest).min();
            }
            Ok(count >= capacity && oldest.is_some_and(|oldest| published < oldest))
        })
        .await
    }

    async fn mark_processed(&self, entry: &Entry) {
        let marked = {
            let entry = entry.clone();
            self.store(move |entries| entries.set_processed(&entry)).await
        };
        if let Err(e) = marked {
            warn!(video = %entry.video_id, "failed to mark processed: {}", e);
        }
    }

    async fn duration_of(&self, file: &str) -> u32 {
        let durations = Arc::clone(&self.durations);
        let path = file.to_string();
        blocking(move || Ok(durations.file(&path)))
            .await
            .unwrap_or_else(|e| {
                warn!(file, "failed to measure duration: {}", e);
                0
            })
    }

    /// Trim the channel and delete the files of what was dropped.
    async fn remove_old(&self, channel: &ChannelPlan) -> usize {
        let (id, keep) = (channel.id.clone(), channel.keep);
        let removed = match self.store(move |entries| entries.remove_old(&id, keep)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("failed to remove old entries: {}", e);
                return 0;
            }
        };

        for record in &removed {
            let Some(file) = &record.file else { continue };
            match tokio::fs::remove_file(file).await {
                Ok(()) => info!(video = %record.identifier, file = %file, "removed old file"),
                Err(e) => warn!(video = %record.identifier, file = %file, "failed to remove file: {}", e),
            }
        }
        removed.len()
    }
}
