//! Channels, users and the peers the platform resolves references to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Platform-assigned numeric channel identifier.
pub type ChannelId = i64;

/// A channel or group on the remote platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    /// Stable numeric identity
    pub id: ChannelId,

    /// Display title
    pub title: String,

    /// Public username, when the channel has one
    #[serde(default)]
    pub username: Option<String>,
}

impl Channel {
    pub fn new(id: ChannelId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.id)
    }
}

/// A user account on the remote platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Result of resolving a username, link or numeric id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Peer {
    User(User),
    Channel(Channel),
}

impl Peer {
    /// Name shown as a message sender: "first last" for users, title for channels.
    pub fn display_name(&self) -> String {
        match self {
            Peer::User(user) => {
                let first = user.first_name.as_deref().unwrap_or("");
                let last = user.last_name.as_deref().unwrap_or("");
                format!("{first} {last}").trim().to_string()
            }
            Peer::Channel(channel) => channel.title.clone(),
        }
    }
}

/// Reference handed to the transport for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerRef {
    /// Public username without the leading `@`
    Username(String),
    /// Numeric account or channel id
    Id(i64),
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRef::Username(name) => write!(f, "@{name}"),
            PeerRef::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Crawl state of a channel.
///
/// Only `Clean` and `Involved` are ever persisted; the other two live in
/// the registry's in-process map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Unseen,
    InProgress,
    Clean,
    Involved,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Unseen => "unseen",
            ChannelStatus::InProgress => "in_progress",
            ChannelStatus::Clean => "clean",
            ChannelStatus::Involved => "involved",
        }
    }

    /// Whether the status is terminal and persisted.
    pub fn is_final(&self) -> bool {
        matches!(self, ChannelStatus::Clean | ChannelStatus::Involved)
    }

    /// Final status for a finished scan.
    pub fn from_matched(matched: bool) -> Self {
        if matched {
            ChannelStatus::Involved
        } else {
            ChannelStatus::Clean
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unseen" => Ok(ChannelStatus::Unseen),
            "in_progress" => Ok(ChannelStatus::InProgress),
            "clean" => Ok(ChannelStatus::Clean),
            "involved" => Ok(ChannelStatus::Involved),
            other => Err(AppError::validation(format!(
                "unknown channel status '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_display_name_joins_and_trims() {
        let peer = Peer::User(User {
            id: 7,
            first_name: Some("Ada".into()),
            last_name: None,
        });
        assert_eq!(peer.display_name(), "Ada");

        let peer = Peer::User(User {
            id: 8,
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
        });
        assert_eq!(peer.display_name(), "Ada Lovelace");
    }

    #[test]
    fn channel_display_name_is_title() {
        let peer = Peer::Channel(Channel::new(1, "Night Market"));
        assert_eq!(peer.display_name(), "Night Market");
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ChannelStatus::Unseen,
            ChannelStatus::InProgress,
            ChannelStatus::Clean,
            ChannelStatus::Involved,
        ] {
            assert_eq!(status.as_str().parse::<ChannelStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ChannelStatus>().is_err());
    }

    #[test]
    fn only_clean_and_involved_are_final() {
        assert!(ChannelStatus::Clean.is_final());
        assert!(ChannelStatus::Involved.is_final());
        assert!(!ChannelStatus::Unseen.is_final());
        assert!(!ChannelStatus::InProgress.is_final());
        assert_eq!(ChannelStatus::from_matched(true), ChannelStatus::Involved);
    }

    #[test]
    fn peer_deserializes_from_tagged_json() {
        let peer: Peer =
            serde_json::from_str(r#"{"kind":"channel","id":42,"title":"Bazaar"}"#).unwrap();
        assert_eq!(peer, Peer::Channel(Channel::new(42, "Bazaar")));
    }
}
