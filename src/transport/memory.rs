//! In-process transport backed by fixtures.
//!
//! Used throughout the test suite.
//! Failures can be scripted per call kind; every call is logged with the
//! (tokio) instant it was made.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::models::{Channel, ChannelId, Message, Peer, PeerRef};
use crate::transport::{Transport, TransportError};

/// Kind of transport call, for scripting failures and reading the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Join,
    Leave,
    FetchMessages,
    Resolve,
    Search,
}

/// A logged call.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    /// Channel id, reference or query the call was made with
    pub target: String,
    pub at: Instant,
}

#[derive(Default)]
struct State {
    history: HashMap<ChannelId, Vec<Message>>,
    join_errors: HashMap<ChannelId, TransportError>,
    peers: HashMap<PeerRef, Peer>,
    searches: HashMap<String, Vec<Channel>>,
    /// (kind, matching calls to let through first, error)
    scripted: VecDeque<(CallKind, usize, TransportError)>,
    calls: Vec<Call>,
    oldest_first: bool,
}

/// Fixture-driven [`Transport`].
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel with its history (any order) and make it resolvable
    /// by id and, when set, by username.
    pub fn add_channel(&self, channel: Channel, mut messages: Vec<Message>) {
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        let mut state = self.lock();
        if let Some(username) = &channel.username {
            state.peers.insert(
                PeerRef::Username(username.to_lowercase()),
                Peer::Channel(channel.clone()),
            );
        }
        state
            .peers
            .insert(PeerRef::Id(channel.id), Peer::Channel(channel.clone()));
        state.history.insert(channel.id, messages);
    }

    /// Make a user or channel resolvable through `reference`.
    pub fn add_peer(&self, reference: PeerRef, peer: Peer) {
        let reference = match reference {
            PeerRef::Username(name) => PeerRef::Username(name.to_lowercase()),
            other => other,
        };
        self.lock().peers.insert(reference, peer);
    }

    /// Channels returned for a search query.
    pub fn add_search_result(&self, query: &str, channels: Vec<Channel>) {
        self.lock().searches.insert(query.to_lowercase(), channels);
    }

    /// Every join of `channel_id` fails with `error`.
    pub fn fail_join(&self, channel_id: ChannelId, error: TransportError) {
        self.lock().join_errors.insert(channel_id, error);
    }

    /// The next call of `kind` fails once with `error`.
    pub fn fail_next(&self, kind: CallKind, error: TransportError) {
        self.fail_after(kind, 0, error);
    }

    /// Let `skip` calls of `kind` through, then fail the following one once.
    pub fn fail_after(&self, kind: CallKind, skip: usize, error: TransportError) {
        self.lock().scripted.push_back((kind, skip, error));
    }

    /// Serve each history page in chronological order instead of newest first.
    pub fn serve_oldest_first(&self) {
        self.lock().oldest_first = true;
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls of one kind made so far.
    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned fixture only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call and pop a scripted failure for it, if one is queued.
    fn enter(&self, kind: CallKind, target: String) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(Call {
            kind,
            target,
            at: Instant::now(),
        });
        let Some(pos) = state.scripted.iter().position(|(k, _, _)| *k == kind) else {
            return Ok(());
        };
        let skip = &mut state.scripted[pos].1;
        if *skip > 0 {
            *skip -= 1;
            return Ok(());
        }
        match state.scripted.remove(pos) {
            Some((_, _, error)) => Err(error),
            None => Ok(()),
        }
    }
}

fn unknown(what: impl std::fmt::Display) -> TransportError {
    TransportError::InvalidIdentity {
        reason: format!("no fixture for {what}"),
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn join(&self, channel: &Channel) -> Result<(), TransportError> {
        self.enter(CallKind::Join, channel.id.to_string())?;
        let state = self.lock();
        if let Some(error) = state.join_errors.get(&channel.id) {
            return Err(error.clone());
        }
        if !state.history.contains_key(&channel.id) {
            return Err(unknown(channel.id));
        }
        Ok(())
    }

    async fn leave(&self, channel: &Channel) -> Result<(), TransportError> {
        self.enter(CallKind::Leave, channel.id.to_string())
    }

    async fn fetch_messages(
        &self,
        channel: &Channel,
        offset_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>, TransportError> {
        self.enter(CallKind::FetchMessages, channel.id.to_string())?;
        let state = self.lock();
        let history = state
            .history
            .get(&channel.id)
            .ok_or_else(|| unknown(channel.id))?;
        let mut page: Vec<Message> = history
            .iter()
            .filter(|m| offset_id.is_none_or(|offset| m.id < offset))
            .take(limit)
            .cloned()
            .collect();
        if state.oldest_first {
            page.reverse();
        }
        Ok(page)
    }

    async fn resolve(&self, reference: &PeerRef) -> Result<Peer, TransportError> {
        self.enter(CallKind::Resolve, reference.to_string())?;
        let key = match reference {
            PeerRef::Username(name) => PeerRef::Username(name.to_lowercase()),
            other => other.clone(),
        };
        self.lock()
            .peers
            .get(&key)
            .cloned()
            .ok_or_else(|| unknown(reference))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Channel>, TransportError> {
        self.enter(CallKind::Search, query.to_string())?;
        Ok(self
            .lock()
            .searches
            .get(&query.to_lowercase())
            .map(|found| found.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_pages_walk_backwards_from_the_offset() {
        let transport = MemoryTransport::new();
        let channel = Channel::new(1, "one");
        let messages = (1..=5).map(|id| Message::new(id, format!("m{id}"))).collect();
        transport.add_channel(channel.clone(), messages);

        let first = transport.fetch_messages(&channel, None, 2).await.unwrap();
        assert_eq!(first.iter().map(|m| m.id).collect::<Vec<_>>(), vec![5, 4]);

        let second = transport
            .fetch_messages(&channel, Some(4), 2)
            .await
            .unwrap();
        assert_eq!(second.iter().map(|m| m.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn oldest_first_pages_keep_the_same_window() {
        let transport = MemoryTransport::new();
        let channel = Channel::new(1, "one");
        let messages = (1..=5).map(|id| Message::new(id, format!("m{id}"))).collect();
        transport.add_channel(channel.clone(), messages);
        transport.serve_oldest_first();

        let first = transport.fetch_messages(&channel, None, 2).await.unwrap();
        assert_eq!(first.iter().map(|m| m.id).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let transport = MemoryTransport::new();
        let channel = Channel::new(1, "one");
        transport.add_channel(channel.clone(), vec![]);
        transport.fail_next(CallKind::Join, TransportError::RateLimited { wait_secs: 5 });

        assert_eq!(
            transport.join(&channel).await,
            Err(TransportError::RateLimited { wait_secs: 5 })
        );
        assert_eq!(transport.join(&channel).await, Ok(()));
        assert_eq!(transport.calls_of(CallKind::Join).len(), 2);
    }

    #[tokio::test]
    async fn delayed_failure_skips_earlier_calls() {
        let transport = MemoryTransport::new();
        let channel = Channel::new(1, "one");
        transport.add_channel(channel.clone(), vec![Message::new(1, "a")]);
        transport.fail_after(CallKind::FetchMessages, 1, TransportError::rpc("boom"));

        assert!(transport.fetch_messages(&channel, None, 1).await.is_ok());
        assert_eq!(
            transport.fetch_messages(&channel, None, 1).await,
            Err(TransportError::rpc("boom"))
        );
        assert!(transport.fetch_messages(&channel, None, 1).await.is_ok());
    }

    #[tokio::test]
    async fn usernames_resolve_case_insensitively() {
        let transport = MemoryTransport::new();
        let channel = Channel::new(9, "Nine").with_username("NineChan");
        transport.add_channel(channel.clone(), vec![]);

        let peer = transport
            .resolve(&PeerRef::Username("ninechan".into()))
            .await
            .unwrap();
        assert_eq!(peer, Peer::Channel(channel));
        assert!(
            transport
                .resolve(&PeerRef::Username("missing".into()))
                .await
                .is_err()
        );
    }
}
