//! Storage abstractions for crawl results.
//!
//! Two independent relations are persisted:
//!
//! ```text
//! messages(id PK, channel TEXT, sender_id INTEGER, sender_name TEXT, message TEXT)
//! channels(id PK, channel_id INTEGER UNIQUE, channel_name TEXT, status TEXT)
//! ```
//!
//! `channel_id` uniqueness is the dedup key behind [`EntityRegistry`].

pub mod registry;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChannelId, ChannelStatus, StoredMessage};

// Re-export for convenience
pub use registry::EntityRegistry;
pub use sqlite::SqliteStore;

/// Durable channel status table.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Recorded status of a channel, if any.
    async fn load_status(&self, channel_id: ChannelId) -> Result<Option<ChannelStatus>>;

    /// Insert a channel row or overwrite its status.
    async fn upsert_status(
        &self,
        channel_id: ChannelId,
        title: &str,
        status: ChannelStatus,
    ) -> Result<()>;

    /// Number of rows per recorded status.
    async fn count_by_status(&self) -> Result<Vec<(ChannelStatus, usize)>>;
}

/// Append-only store of matching messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert one message and return its row id.
    async fn insert_message(&self, message: &StoredMessage) -> Result<i64>;

    /// Total number of stored messages.
    async fn count_messages(&self) -> Result<usize>;
}
