//! One news-push run: fetch every configured source, publish the recent
//! entries that were not notified before, and record them.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{Config, Source};
use crate::dedup::DedupCache;
use crate::feed::{recent_entries, FeedEntry, FeedFetcher};
use crate::notify::{format_notification, Publisher};
use crate::report::ErrorReporter;

/// Counters of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries published successfully.
    pub sent: usize,
    /// Entries whose processing raised an error. An entry that was published
    /// but could not be recorded counts as both sent and failed.
    pub failed: usize,
    /// Entries skipped as incomplete, already notified or undeliverable.
    pub skipped: usize,
    /// Sources whose feed could not be fetched or parsed.
    pub sources_failed: usize,
}

enum EntryOutcome {
    Sent,
    Skipped,
}

/// Drives the fetch, filter, dedup, format and publish pipeline.
pub struct FeedChecker {
    config: Arc<Config>,
    fetcher: Arc<dyn FeedFetcher>,
    publisher: Arc<dyn Publisher>,
    dedup: DedupCache,
    reporter: Arc<dyn ErrorReporter>,
}

impl FeedChecker {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn FeedFetcher>,
        publisher: Arc<dyn Publisher>,
        dedup: DedupCache,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            config,
            fetcher,
            publisher,
            dedup,
            reporter,
        }
    }

    pub fn reporter(&self) -> Arc<dyn ErrorReporter> {
        Arc::clone(&self.reporter)
    }

    /// Run one pass over all sources. Never fails: every error is logged,
    /// reported and counted.
    pub async fn run(&self) -> RunSummary {
        self.run_at(Utc::now()).await
    }

    /// Like [`run`](Self::run) with an explicit reference time for the
    /// recent-entries window.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();

        for (tag_name, sources) in &self.config.sources {
            for source in sources {
                self.check_source(tag_name, source, now, &mut summary).await;
            }
        }

        tracing::info!(
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            sources_failed = summary.sources_failed,
            "News push complete"
        );
        summary
    }

    async fn check_source(
        &self,
        tag_name: &str,
        source: &Source,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) {
        let feed = match self.fetcher.fetch(&source.url).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(feed = %source.url, error = %e, "Failed to fetch feed");
                summary.sources_failed += 1;
                return;
            }
        };

        let entries = recent_entries(feed.entries, now, self.config.recent_window());
        if entries.is_empty() {
            tracing::debug!(feed = %source.url, "No recent entries");
            return;
        }

        for entry in &entries {
            let result = self
                .check_entry(tag_name, source, feed.title.as_deref(), entry, summary)
                .await;
            match result {
                Ok(EntryOutcome::Sent) => {}
                Ok(EntryOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        feed = %source.url,
                        link = entry.link.as_deref().unwrap_or_default(),
                        error = %format!("{e:#}"),
                        "Failed to process entry"
                    );
                    self.reporter.report(&e);
                    summary.failed += 1;
                }
            }
        }
    }

    async fn check_entry(
        &self,
        tag_name: &str,
        source: &Source,
        feed_title: Option<&str>,
        entry: &FeedEntry,
        summary: &mut RunSummary,
    ) -> Result<EntryOutcome> {
        let (Some(link), Some(_)) = (entry.link.as_deref(), entry.title.as_deref()) else {
            tracing::debug!(feed = %source.url, "Skipping entry without link or title");
            return Ok(EntryOutcome::Skipped);
        };

        let existing = self
            .dedup
            .get(&source.url, link)
            .await
            .context("Failed to look up check record")?;
        if DedupCache::is_seen(existing.as_ref()) {
            tracing::debug!(feed = %source.url, link = %link, "Already notified");
            return Ok(EntryOutcome::Skipped);
        }

        let Some(tag) = self.config.tag(tag_name) else {
            tracing::error!(tag = %tag_name, feed = %source.url, "No definition for tag");
            return Ok(EntryOutcome::Skipped);
        };
        if tag.channel_id.is_empty() {
            tracing::error!(tag = %tag_name, "Tag has no channel");
            return Ok(EntryOutcome::Skipped);
        }
        let usable = self
            .publisher
            .channel_usable(&tag.channel_id)
            .await
            .with_context(|| format!("Failed to resolve channel {}", tag.channel_id))?;
        if !usable {
            tracing::error!(tag = %tag_name, channel = %tag.channel_id, "Channel not found or does not accept messages");
            return Ok(EntryOutcome::Skipped);
        }

        let notification = format_notification(
            entry,
            feed_title,
            source,
            tag,
            self.config.embedded_image_policy,
        )
        .with_context(|| format!("Failed to format {link}"))?;
        self.publisher
            .send(&tag.channel_id, &notification)
            .await
            .with_context(|| format!("Failed to publish {link}"))?;
        summary.sent += 1;
        tracing::info!(feed = %source.url, link = %link, channel = %tag.channel_id, "Published entry");

        self.dedup
            .record_checked(&source.url, link, existing.is_some())
            .await
            .with_context(|| format!("Failed to record {link}"))?;
        Ok(EntryOutcome::Sent)
    }
}
