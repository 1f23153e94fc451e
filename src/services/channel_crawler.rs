// src/services/channel_crawler.rs

//! Per-channel crawl.
//!
//! One task walks a channel through join, scan, frontier extraction and
//! leave, then records the verdict. Every platform call goes through
//! [`with_flood_wait`], so a rate limit only delays the task that hit it.
//! Nothing is written to the channel registry unless the scan completed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    Channel, ChannelStatus, CrawlOutcome, CrawlStage, CrawlTask, Message, Peer, PeerRef,
    StoredMessage,
};
use crate::pipeline::scheduler::TaskHandler;
use crate::services::CrawlContext;
use crate::services::frontier::extract_references;
use crate::transport::{TransportError, with_flood_wait};
use crate::utils::preview;

/// Why a crawl stopped before recording a status.
enum Abort {
    Transport(CrawlStage, TransportError),
    Local(CrawlStage, AppError),
    Cancelled,
}

impl Abort {
    fn into_outcome(self, channel: &Channel) -> CrawlOutcome {
        match self {
            Abort::Cancelled | Abort::Transport(_, TransportError::Interrupted) => {
                log::info!("Crawl of {channel} interrupted by shutdown");
                CrawlOutcome::Cancelled
            }
            Abort::Transport(stage, TransportError::PrivateOrForbidden { reason }) => {
                log::warn!("Skipping {channel}: private or forbidden while {stage} ({reason})");
                CrawlOutcome::SkippedPrivate
            }
            Abort::Transport(stage, TransportError::InvalidIdentity { reason }) => {
                log::warn!("Skipping {channel}: invalid identity while {stage} ({reason})");
                CrawlOutcome::SkippedInvalid
            }
            Abort::Transport(stage, e) => {
                log::error!("Crawl of {channel} failed while {stage}: {e}");
                CrawlOutcome::SkippedError {
                    stage,
                    message: e.to_string(),
                }
            }
            Abort::Local(stage, e) => {
                log::error!("Crawl of {channel} failed while {stage}: {e}");
                CrawlOutcome::SkippedError {
                    stage,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Crawl worker: runs one [`CrawlTask`] to a [`CrawlOutcome`].
#[derive(Clone)]
pub struct ChannelCrawler {
    ctx: Arc<CrawlContext>,
}

impl ChannelCrawler {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }

    /// Crawl one channel.
    ///
    /// A task for a channel that is already in progress or finalized ends as
    /// `Duplicate` without any platform call. Any outcome other than
    /// `Classified` leaves the channel unrecorded.
    pub async fn crawl(&self, task: &CrawlTask) -> CrawlOutcome {
        let channel = &task.channel;
        if self.ctx.cancel.is_cancelled() {
            return CrawlOutcome::Cancelled;
        }

        match self.ctx.registry.begin(channel.id).await {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Skipping {channel}: already in progress or finalized");
                return CrawlOutcome::Duplicate;
            }
            Err(e) => return Abort::Local(CrawlStage::Joining, e).into_outcome(channel),
        }

        let outcome = match self.run(task).await {
            Ok(status) => CrawlOutcome::Classified(status),
            Err(abort) => abort.into_outcome(channel),
        };
        if !matches!(outcome, CrawlOutcome::Classified(_)) {
            self.ctx.registry.abandon(channel.id);
        }
        outcome
    }

    async fn run(&self, task: &CrawlTask) -> std::result::Result<ChannelStatus, Abort> {
        let channel = &task.channel;
        let transport = &*self.ctx.transport;
        let cancel = &self.ctx.cancel;

        with_flood_wait(cancel, "join", move || transport.join(channel))
            .await
            .map_err(|e| Abort::Transport(CrawlStage::Joining, e))?;
        log::info!("Joined {channel}");

        let scanned = self.scan(task).await;
        self.leave(channel).await;
        let matched = scanned?;

        let status = ChannelStatus::from_matched(matched);
        self.ctx
            .registry
            .record_status(channel.id, &channel.title, status)
            .await
            .map_err(|e| Abort::Local(CrawlStage::Classifying, e))?;
        log::info!("Channel {channel} classified as {status}");
        Ok(status)
    }

    /// Walk back through the message window page by page.
    ///
    /// The cursor only advances past a page once it has been fetched, so a
    /// page retried after a rate limit is neither repeated nor skipped.
    async fn scan(&self, task: &CrawlTask) -> std::result::Result<bool, Abort> {
        let channel = &task.channel;
        let transport = &*self.ctx.transport;
        let cancel = &self.ctx.cancel;
        let page_size = self.ctx.crawler.page_size.max(1);

        let mut remaining = self.ctx.crawler.message_window;
        let mut offset_id = None;
        let mut matched = false;
        let mut references = HashSet::new();

        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(Abort::Cancelled);
            }

            let limit = remaining.min(page_size);
            let mut page = with_flood_wait(cancel, "message fetch", move || {
                transport.fetch_messages(channel, offset_id, limit)
            })
            .await
            .map_err(|e| Abort::Transport(CrawlStage::Scanning, e))?;
            page.truncate(limit);

            let Some(oldest) = page.iter().map(|m| m.id).min() else {
                break;
            };
            offset_id = Some(oldest);
            remaining -= page.len();

            for message in &page {
                if self.inspect(task, message).await? {
                    matched = true;
                }
                self.extract(task, message, &mut references).await?;
            }

            if page.len() < limit {
                break;
            }
        }

        Ok(matched)
    }

    /// Classify one message and store it when flagged.
    async fn inspect(
        &self,
        task: &CrawlTask,
        message: &Message,
    ) -> std::result::Result<bool, Abort> {
        let text = message.text();
        let Some(signal) = self
            .ctx
            .classifier
            .matching_signal(text, &task.keywords)
        else {
            return Ok(false);
        };

        let sender_name = self.sender_name(message).await?;
        let row = StoredMessage {
            channel: task.channel.title.clone(),
            sender_id: message.sender_id,
            sender_name,
            message: text.to_string(),
        };
        self.ctx
            .messages
            .insert_message(&row)
            .await
            .map_err(|e| Abort::Local(CrawlStage::Scanning, e))?;

        log::info!(
            "Flagged message {} in {} ({signal} match): {}",
            message.id,
            task.channel,
            preview(text, 80)
        );
        Ok(true)
    }

    /// Display name of the sender, or empty when it cannot be resolved.
    async fn sender_name(&self, message: &Message) -> std::result::Result<String, Abort> {
        let Some(sender_id) = message.sender_id else {
            return Ok(String::new());
        };
        let transport = &*self.ctx.transport;
        let reference = &PeerRef::Id(sender_id);

        match with_flood_wait(&self.ctx.cancel, "sender lookup", move || {
            transport.resolve(reference)
        })
        .await
        {
            Ok(peer) => Ok(peer.display_name()),
            Err(
                e @ (TransportError::PrivateOrForbidden { .. }
                | TransportError::InvalidIdentity { .. }),
            ) => {
                log::debug!("Sender {sender_id} not resolvable: {e}");
                Ok(String::new())
            }
            Err(e) => Err(Abort::Transport(CrawlStage::Scanning, e)),
        }
    }

    /// Resolve new channel references in a message and submit unseen channels.
    async fn extract(
        &self,
        task: &CrawlTask,
        message: &Message,
        seen: &mut HashSet<String>,
    ) -> std::result::Result<(), Abort> {
        let channel = &task.channel;
        let transport = &*self.ctx.transport;
        let cancel = &self.ctx.cancel;

        for reference in extract_references(message) {
            if !seen.insert(reference.to_string().to_lowercase()) {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(Abort::Cancelled);
            }

            let target = &reference;
            let peer = match with_flood_wait(cancel, "reference lookup", move || {
                transport.resolve(target)
            })
            .await
            {
                Ok(peer) => peer,
                Err(TransportError::Interrupted) => return Err(Abort::Cancelled),
                Err(e) => {
                    log::warn!("Could not resolve {reference} found in {channel}: {e}");
                    continue;
                }
            };

            let Peer::Channel(found) = peer else {
                log::debug!("{reference} in {channel} is a user, not a channel");
                continue;
            };
            if found.id == channel.id {
                continue;
            }

            let claimed = self
                .ctx
                .registry
                .try_claim(found.id)
                .await
                .map_err(|e| Abort::Local(CrawlStage::Extracting, e))?;
            if !claimed {
                log::debug!("{found} already known, not resubmitting");
                continue;
            }

            log::info!("Discovered {found} via {reference} in {channel}");
            self.ctx
                .submitter
                .submit(CrawlTask::new(found, task.keywords.clone()))
                .map_err(|e| Abort::Local(CrawlStage::Extracting, e))?;
            self.ctx.stats.record_discovery();
        }

        Ok(())
    }

    /// Best-effort leave; failures are only logged.
    async fn leave(&self, channel: &Channel) {
        let transport = &*self.ctx.transport;
        match with_flood_wait(&self.ctx.cancel, "leave", move || transport.leave(channel)).await {
            Ok(()) => log::debug!("Left {channel}"),
            Err(e) => log::warn!("Failed to leave {channel}: {e}"),
        }
    }
}

#[async_trait]
impl TaskHandler<CrawlTask> for ChannelCrawler {
    async fn handle(&self, task: CrawlTask) -> Result<()> {
        let outcome = self.crawl(&task).await;
        self.ctx.stats.record(&outcome);
        Ok(())
    }
}
