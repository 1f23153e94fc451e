//! Shared state handed to the seed loop and every crawl worker.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::models::{CrawlStats, CrawlTask, CrawlerConfig, Keywords};
use crate::pipeline::scheduler::TaskSender;
use crate::services::ContentClassifier;
use crate::storage::{EntityRegistry, MessageStore};
use crate::transport::Transport;

/// Everything a crawl needs, built once at startup.
pub struct CrawlContext {
    pub transport: Arc<dyn Transport>,
    pub registry: Arc<EntityRegistry>,
    pub messages: Arc<dyn MessageStore>,
    pub classifier: ContentClassifier,
    pub submitter: TaskSender<CrawlTask>,
    pub stats: Arc<CrawlStats>,
    pub cancel: CancellationToken,
    pub crawler: CrawlerConfig,

    /// Keywords used to flag messages
    pub message_keywords: Keywords,

    /// Keywords used to search for entry-point channels
    pub channel_keywords: Keywords,
}
