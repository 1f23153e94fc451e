//! Channel dedup and crawl-state registry.
//!
//! Final statuses (`clean`, `involved`) are persisted through a
//! [`ChannelStore`]; `unseen` and `in_progress` only exist in an in-process
//! map. A channel that is claimed but never finalized (private, invalid, or
//! a failed crawl) is therefore skipped for the rest of this run and picked
//! up again on the next one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::models::{ChannelId, ChannelStatus};
use crate::storage::ChannelStore;

/// Registry of every channel this process has discovered.
pub struct EntityRegistry {
    store: Arc<dyn ChannelStore>,
    known: Mutex<HashMap<ChannelId, ChannelStatus>>,
}

impl EntityRegistry {
    pub fn new(store: Arc<dyn ChannelStore>) -> Self {
        Self {
            store,
            known: Mutex::new(HashMap::new()),
        }
    }

    fn known(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelStatus>> {
        // The map stays consistent even if a holder panicked mid-insert.
        self.known.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim a channel for scheduling.
    ///
    /// Returns `true` exactly once per channel that has no recorded final
    /// status; concurrent claims of the same id see a single `true`.
    pub async fn try_claim(&self, channel_id: ChannelId) -> Result<bool> {
        if self.known().contains_key(&channel_id) {
            return Ok(false);
        }

        let persisted = self.store.load_status(channel_id).await?;

        let mut known = self.known();
        if known.contains_key(&channel_id) {
            return Ok(false);
        }
        match persisted {
            Some(status) if status.is_final() => {
                known.insert(channel_id, status);
                Ok(false)
            }
            _ => {
                known.insert(channel_id, ChannelStatus::Unseen);
                Ok(true)
            }
        }
    }

    /// Mark a channel as being crawled.
    ///
    /// Returns `false` if it is already in progress or finalized, so a
    /// duplicate task can bail out before touching the transport.
    pub async fn begin(&self, channel_id: ChannelId) -> Result<bool> {
        {
            let mut known = self.known();
            match known.get(&channel_id).copied() {
                Some(ChannelStatus::Unseen) => {
                    known.insert(channel_id, ChannelStatus::InProgress);
                    return Ok(true);
                }
                Some(_) => return Ok(false),
                None => {}
            }
        }

        // Submitted without a claim: consult the durable table first.
        let persisted = self.store.load_status(channel_id).await?;

        let mut known = self.known();
        match known.get(&channel_id).copied() {
            Some(ChannelStatus::Unseen) => {
                known.insert(channel_id, ChannelStatus::InProgress);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => match persisted {
                Some(status) if status.is_final() => {
                    known.insert(channel_id, status);
                    Ok(false)
                }
                _ => {
                    known.insert(channel_id, ChannelStatus::InProgress);
                    Ok(true)
                }
            },
        }
    }

    /// Return an unfinished channel to `unseen` without persisting anything.
    pub fn abandon(&self, channel_id: ChannelId) {
        let mut known = self.known();
        if let Some(status) = known.get_mut(&channel_id) {
            if *status == ChannelStatus::InProgress {
                *status = ChannelStatus::Unseen;
            }
        }
    }

    /// Persist a final status (insert or overwrite; last write wins).
    pub async fn record_status(
        &self,
        channel_id: ChannelId,
        title: &str,
        status: ChannelStatus,
    ) -> Result<()> {
        if !status.is_final() {
            return Err(AppError::validation(format!(
                "refusing to persist non-final status '{status}' for channel {channel_id}"
            )));
        }
        self.store.upsert_status(channel_id, title, status).await?;
        self.known().insert(channel_id, status);
        Ok(())
    }

    /// Current status: in-process state first, then the durable table.
    pub async fn status(&self, channel_id: ChannelId) -> Result<ChannelStatus> {
        if let Some(status) = self.known().get(&channel_id).copied() {
            return Ok(status);
        }
        Ok(self
            .store
            .load_status(channel_id)
            .await?
            .unwrap_or(ChannelStatus::Unseen))
    }

    /// Counts of persisted statuses.
    pub async fn persisted_counts(&self) -> Result<Vec<(ChannelStatus, usize)>> {
        self.store.count_by_status().await
    }
}
