//! Message data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message observed while scanning a channel's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Platform message id, increasing within a channel
    pub id: i64,

    /// Sender account or channel id (absent for anonymous channel posts)
    #[serde(default)]
    pub sender_id: Option<i64>,

    /// Raw text (absent for media-only posts)
    #[serde(default)]
    pub text: Option<String>,

    /// Publication time
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    /// Targets of hidden text links attached to the message
    #[serde(default)]
    pub text_urls: Vec<String>,
}

impl Message {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            sender_id: None,
            text: Some(text.into()),
            date: None,
            text_urls: Vec::new(),
        }
    }

    pub fn from_sender(mut self, sender_id: i64) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    /// Text or the empty string.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// A row of the `messages` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    /// Title of the channel the message was found in
    pub channel: String,
    pub sender_id: Option<i64>,
    pub sender_name: String,
    pub message: String,
}
