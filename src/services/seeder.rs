// src/services/seeder.rs

//! Seed loop: periodic discovery searches feeding the scheduler.

use std::sync::Arc;

use crate::error::Result;
use crate::models::CrawlTask;
use crate::services::CrawlContext;
use crate::transport::{TransportError, with_flood_wait};

/// Searches every channel keyword, submits unclaimed results, sleeps, repeats.
pub struct SeedLoop {
    ctx: Arc<CrawlContext>,
}

impl SeedLoop {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }

    /// Run passes until cancelled.
    pub async fn run(&self) {
        let interval = self.ctx.crawler.seed_interval();
        loop {
            if self.ctx.cancel.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Ok(submitted) => log::info!(
                    "Seed pass submitted {submitted} channel(s), {} task(s) queued",
                    self.ctx.submitter.pending()
                ),
                Err(e) => log::error!("Seed pass aborted: {e}"),
            }

            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        log::info!("Seed loop stopped");
    }

    /// One pass over the channel keywords. Returns the number of submitted tasks.
    ///
    /// Search failures are logged and the pass moves on to the next keyword;
    /// registry and queue failures end the pass with an error.
    pub async fn run_once(&self) -> Result<usize> {
        let transport = &*self.ctx.transport;
        let cancel = &self.ctx.cancel;
        let limit = self.ctx.crawler.search_limit;
        let mut submitted = 0;

        for keyword in self.ctx.channel_keywords.iter() {
            if cancel.is_cancelled() {
                break;
            }

            let found = match with_flood_wait(cancel, "search", move || {
                transport.search(keyword, limit)
            })
            .await
            {
                Ok(found) => found,
                Err(TransportError::Interrupted) => break,
                Err(e) => {
                    log::warn!("Search for '{keyword}' failed: {e}");
                    continue;
                }
            };
            log::debug!("Search for '{keyword}' returned {} channel(s)", found.len());

            for channel in found {
                if !self.ctx.registry.try_claim(channel.id).await? {
                    log::debug!("{channel} already known, not seeding");
                    continue;
                }
                log::info!("Seeding {channel} from search '{keyword}'");
                self.ctx.submitter.submit(CrawlTask::new(
                    channel,
                    self.ctx.message_keywords.clone(),
                ))?;
                submitted += 1;
            }
        }

        Ok(submitted)
    }
}
