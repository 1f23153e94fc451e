// src/pipeline/crawl.rs

//! Channel crawling pipeline.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ChannelStatus, Config, CrawlStats, Keywords};
use crate::pipeline::scheduler::{RateLimitedScheduler, task_queue};
use crate::services::{ChannelCrawler, ContentClassifier, CrawlContext, SeedLoop};
use crate::storage::{EntityRegistry, MessageStore, SqliteStore};
use crate::transport::Transport;

/// What a crawl run did, reported on shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Task outcome counters by label
    pub outcomes: Vec<(&'static str, usize)>,
    /// Rows in the messages table
    pub stored_messages: usize,
    /// Persisted channel statuses
    pub channels: Vec<(ChannelStatus, usize)>,
    /// Tasks still queued when the workers stopped
    pub abandoned_tasks: usize,
}

impl CrawlSummary {
    fn log(&self) {
        for (label, count) in &self.outcomes {
            log::info!("  {label}: {count}");
        }
        log::info!("  stored messages: {}", self.stored_messages);
        for (status, count) in &self.channels {
            log::info!("  channels {status}: {count}");
        }
        if self.abandoned_tasks > 0 {
            log::info!("  tasks left in queue: {}", self.abandoned_tasks);
        }
    }
}

/// Run the crawler until `cancel` fires, then drain the workers and
/// report what was done.
pub async fn run_crawler(
    config: &Config,
    message_keywords: Keywords,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) -> Result<CrawlSummary> {
    let start_time = Utc::now();
    if message_keywords.is_empty() {
        return Err(AppError::validation("No message keywords given"));
    }
    let channel_keywords = Keywords::new(&config.channel_keywords);
    log::info!(
        "Starting crawler with {} message keyword(s) and {} channel keyword(s)",
        message_keywords.len(),
        channel_keywords.len()
    );

    let messages_db = SqliteStore::open(&config.storage.messages_db).await?;
    let channels_db = if config.storage.channels_db == config.storage.messages_db {
        messages_db.clone()
    } else {
        SqliteStore::open(&config.storage.channels_db).await?
    };
    log::info!(
        "Storing messages in {} and channels in {}",
        config.storage.messages_db,
        config.storage.channels_db
    );

    let (submitter, queue) = task_queue();
    let stats = Arc::new(CrawlStats::default());
    let registry = Arc::new(EntityRegistry::new(Arc::new(channels_db)));
    let ctx = Arc::new(CrawlContext {
        transport,
        registry: Arc::clone(&registry),
        messages: Arc::new(messages_db.clone()),
        classifier: ContentClassifier::from_config(&config.classifier),
        submitter,
        stats: Arc::clone(&stats),
        cancel: cancel.clone(),
        crawler: config.crawler.clone(),
        message_keywords,
        channel_keywords,
    });

    let scheduler = RateLimitedScheduler::start(
        config.crawler.workers,
        config.crawler.task_interval(),
        queue,
        Arc::new(ChannelCrawler::new(Arc::clone(&ctx))),
        cancel.clone(),
    );

    SeedLoop::new(ctx).run().await;

    log::info!("Shutting down, waiting for running tasks");
    let abandoned_tasks = scheduler.pending();
    scheduler.shutdown().await;

    let summary = CrawlSummary {
        outcomes: stats.summary(),
        stored_messages: messages_db.count_messages().await?,
        channels: registry.persisted_counts().await?,
        abandoned_tasks,
    };

    let elapsed = Utc::now() - start_time;
    log::info!("Crawl finished after {}s", elapsed.num_seconds());
    summary.log();

    Ok(summary)
}
