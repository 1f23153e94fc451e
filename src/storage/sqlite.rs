// src/storage/sqlite.rs

//! SQLite storage implementation.
//!
//! Each [`SqliteStore`] owns one `tokio_rusqlite` connection. Both tables are
//! created on open, so the same type serves the messages database, the
//! channels database, or a single file holding both. Every write is a single
//! statement; no multi-row transactions are needed.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{ChannelId, ChannelStatus, StoredMessage};
use crate::storage::{ChannelStore, MessageStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY,
        channel TEXT,
        sender_id INTEGER,
        sender_name TEXT,
        message TEXT
    );
    CREATE TABLE IF NOT EXISTS channels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        channel_id INTEGER UNIQUE,
        channel_name TEXT,
        status TEXT
    );
";

/// SQLite-backed channel and message store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| -> std::result::Result<(), rusqlite::Error> {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }
}

#[async_trait]
impl ChannelStore for SqliteStore {
    async fn load_status(&self, channel_id: ChannelId) -> Result<Option<ChannelStatus>> {
        let raw = self
            .conn
            .call(
                move |conn| -> std::result::Result<Option<String>, rusqlite::Error> {
                    let mut stmt =
                        conn.prepare("SELECT status FROM channels WHERE channel_id = ?1")?;
                    let status = stmt
                        .query_row(rusqlite::params![channel_id], |row| row.get(0))
                        .optional()?;
                    Ok(status)
                },
            )
            .await?;
        raw.map(|s| s.parse()).transpose()
    }

    async fn upsert_status(
        &self,
        channel_id: ChannelId,
        title: &str,
        status: ChannelStatus,
    ) -> Result<()> {
        let title = title.to_string();
        let status = status.as_str();
        self.conn
            .call(move |conn| -> std::result::Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO channels (channel_id, channel_name, status) \
                     VALUES (?1, ?2, ?3) \
                     ON CONFLICT(channel_id) DO UPDATE SET status = excluded.status",
                    rusqlite::params![channel_id, title, status],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count_by_status(&self) -> Result<Vec<(ChannelStatus, usize)>> {
        let rows = self
            .conn
            .call(
                |conn| -> std::result::Result<Vec<(String, i64)>, rusqlite::Error> {
                    let mut stmt = conn.prepare(
                        "SELECT status, COUNT(*) FROM channels GROUP BY status ORDER BY status",
                    )?;
                    let rows = stmt
                        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    Ok(rows)
                },
            )
            .await?;
        rows.into_iter()
            .map(|(status, count)| -> Result<(ChannelStatus, usize)> {
                Ok((status.parse()?, count.max(0) as usize))
            })
            .collect()
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_message(&self, message: &StoredMessage) -> Result<i64> {
        let message = message.clone();
        let id = self
            .conn
            .call(move |conn| -> std::result::Result<i64, rusqlite::Error> {
                conn.execute(
                    "INSERT INTO messages (channel, sender_id, sender_name, message) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        message.channel,
                        message.sender_id,
                        message.sender_name,
                        message.message,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    async fn count_messages(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| -> std::result::Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            })
            .await?;
        Ok(count.max(0) as usize)
    }
}

impl SqliteStore {
    /// All stored messages in insertion order.
    pub async fn messages(&self) -> Result<Vec<StoredMessage>> {
        let rows = self
            .conn
            .call(
                |conn| -> std::result::Result<Vec<StoredMessage>, rusqlite::Error> {
                    let mut stmt = conn.prepare(
                        "SELECT channel, sender_id, sender_name, message FROM messages ORDER BY id",
                    )?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok(StoredMessage {
                                channel: row.get(0)?,
                                sender_id: row.get(1)?,
                                sender_name: row.get(2)?,
                                message: row.get(3)?,
                            })
                        })?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    Ok(rows)
                },
            )
            .await?;
        Ok(rows)
    }
}
