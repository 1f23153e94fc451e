//! Remote platform access.
//!
//! The crawler never talks to the platform directly; it goes through the
//! [`Transport`] trait. Two implementations ship with the crate:
//!
//! - [`HttpTransport`]: JSON client for the session gateway that owns the
//!   authenticated platform session
//! - [`MemoryTransport`]: in-process fixtures for dry runs and tests

pub mod http;
pub mod memory;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{Channel, Message, Peer, PeerRef};

pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// Failure kinds a platform call can end with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is private, or we are banned or not allowed in
    #[error("private or forbidden: {reason}")]
    PrivateOrForbidden { reason: String },

    /// The platform does not recognize the id or username
    #[error("invalid identity: {reason}")]
    InvalidIdentity { reason: String },

    /// Flood control; retry after the given number of seconds
    #[error("rate limited for {wait_secs}s")]
    RateLimited { wait_secs: u64 },

    /// Any other remote or network failure
    #[error("rpc error: {message}")]
    Rpc { message: String },

    /// Shutdown was requested while waiting out a rate limit
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl TransportError {
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            message: message.into(),
        }
    }
}

/// Calls the crawler makes against the remote platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join (subscribe to) a channel. Joining twice is harmless.
    async fn join(&self, channel: &Channel) -> Result<(), TransportError>;

    /// Leave a channel. Leaving twice is harmless.
    async fn leave(&self, channel: &Channel) -> Result<(), TransportError>;

    /// One page of history, newest first, strictly older than `offset_id`
    /// when given. An empty page means the history is exhausted.
    async fn fetch_messages(
        &self,
        channel: &Channel,
        offset_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>, TransportError>;

    /// Resolve a username or numeric id to a user or channel.
    async fn resolve(&self, reference: &PeerRef) -> Result<Peer, TransportError>;

    /// Global search for channels matching `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Channel>, TransportError>;
}

/// Run `call`, sleeping through rate limits and retrying the same call.
///
/// Only the calling task waits. Returns `Interrupted` if `cancel` fires
/// during a wait.
pub async fn with_flood_wait<T, F, Fut>(
    cancel: &CancellationToken,
    what: &str,
    mut call: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    loop {
        match call().await {
            Err(TransportError::RateLimited { wait_secs }) => {
                log::warn!("Rate limit exceeded during {what}. Waiting for {wait_secs} seconds.");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransportError::Interrupted),
                    _ = tokio::time::sleep(Duration::from_secs(wait_secs)) => {}
                }
            }
            other => return other,
        }
    }
}
