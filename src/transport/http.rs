// src/transport/http.rs

//! Session gateway client.
//!
//! The gateway owns the authenticated platform session and exposes the
//! calls the crawler needs as a small JSON API:
//!
//! ```text
//! POST /channels/{id}/join
//! POST /channels/{id}/leave
//! GET  /channels/{id}/messages?limit=N[&offset_id=M]
//! GET  /resolve?peer=<username|id>
//! GET  /search?q=<query>&limit=N
//! ```
//!
//! Failures come back as `{"error": "CODE", "message": "...", "retry_after": N}`
//! and are mapped onto [`TransportError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Result;
use crate::models::{Channel, Message, Peer, PeerRef, TransportConfig};
use crate::transport::{Transport, TransportError};

const PRIVATE_CODES: &[&str] = &[
    "CHANNEL_PRIVATE",
    "CHAT_FORBIDDEN",
    "CHANNEL_BANNED",
    "CHAT_WRITE_FORBIDDEN",
    "INVITE_REQUEST_SENT",
    "USER_BANNED_IN_CHANNEL",
];

const INVALID_CODES: &[&str] = &[
    "PEER_ID_INVALID",
    "CHANNEL_INVALID",
    "USERNAME_INVALID",
    "USERNAME_NOT_OCCUPIED",
];

/// Error body returned by the gateway.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    chats: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

/// [`Transport`] backed by the session gateway.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpTransport {
    /// Create a gateway client from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // A trailing slash keeps `join` from replacing the last path segment.
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::rpc(format!("bad endpoint {path}: {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, TransportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TransportError::rpc(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorBody>(&body).unwrap_or_else(|_| ErrorBody {
            message: Some(body),
            ..ErrorBody::default()
        });
        Err(map_error(status, &parsed))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> std::result::Result<T, TransportError> {
        let response = self.send(self.client.get(url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::rpc(format!("malformed gateway response: {e}")))
    }

    async fn post_empty(&self, url: Url) -> std::result::Result<(), TransportError> {
        self.send(self.client.post(url)).await.map(|_| ())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn join(&self, channel: &Channel) -> std::result::Result<(), TransportError> {
        let url = self.endpoint(&format!("channels/{}/join", channel.id))?;
        self.post_empty(url).await
    }

    async fn leave(&self, channel: &Channel) -> std::result::Result<(), TransportError> {
        let url = self.endpoint(&format!("channels/{}/leave", channel.id))?;
        self.post_empty(url).await
    }

    async fn fetch_messages(
        &self,
        channel: &Channel,
        offset_id: Option<i64>,
        limit: usize,
    ) -> std::result::Result<Vec<Message>, TransportError> {
        let mut url = self.endpoint(&format!("channels/{}/messages", channel.id))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(offset) = offset_id {
                query.append_pair("offset_id", &offset.to_string());
            }
        }
        let page: MessagesResponse = self.get_json(url).await?;
        Ok(page.messages)
    }

    async fn resolve(&self, reference: &PeerRef) -> std::result::Result<Peer, TransportError> {
        let peer = match reference {
            PeerRef::Username(name) => name.clone(),
            PeerRef::Id(id) => id.to_string(),
        };
        let mut url = self.endpoint("resolve")?;
        url.query_pairs_mut().append_pair("peer", &peer);
        self.get_json(url).await
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Channel>, TransportError> {
        let mut url = self.endpoint("search")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        let found: SearchResponse = self.get_json(url).await?;
        Ok(found.chats)
    }
}

/// Map a gateway failure onto the transport taxonomy.
fn map_error(status: StatusCode, body: &ErrorBody) -> TransportError {
    let code = body.error.to_ascii_uppercase();
    let reason = body
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| code.clone());

    if status == StatusCode::TOO_MANY_REQUESTS || code.starts_with("FLOOD_WAIT") {
        let wait_secs = body
            .retry_after
            .or_else(|| code.rsplit('_').next().and_then(|n| n.parse().ok()))
            .unwrap_or(1);
        return TransportError::RateLimited { wait_secs };
    }
    if PRIVATE_CODES.contains(&code.as_str()) || status == StatusCode::FORBIDDEN {
        return TransportError::PrivateOrForbidden { reason };
    }
    if INVALID_CODES.contains(&code.as_str()) || status == StatusCode::NOT_FOUND {
        return TransportError::InvalidIdentity { reason };
    }
    TransportError::Rpc {
        message: format!("{status}: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(error: &str, retry_after: Option<u64>) -> ErrorBody {
        ErrorBody {
            error: error.to_string(),
            message: None,
            retry_after,
        }
    }

    #[test]
    fn too_many_requests_is_rate_limited() {
        assert_eq!(
            map_error(StatusCode::TOO_MANY_REQUESTS, &body("", Some(30))),
            TransportError::RateLimited { wait_secs: 30 }
        );
    }

    #[test]
    fn flood_wait_code_carries_its_delay() {
        assert_eq!(
            map_error(StatusCode::BAD_REQUEST, &body("FLOOD_WAIT_42", None)),
            TransportError::RateLimited { wait_secs: 42 }
        );
    }

    #[test]
    fn private_codes_and_forbidden_status() {
        assert!(matches!(
            map_error(StatusCode::BAD_REQUEST, &body("CHANNEL_PRIVATE", None)),
            TransportError::PrivateOrForbidden { .. }
        ));
        assert!(matches!(
            map_error(StatusCode::FORBIDDEN, &body("", None)),
            TransportError::PrivateOrForbidden { .. }
        ));
    }

    #[test]
    fn invalid_codes_and_not_found() {
        assert!(matches!(
            map_error(StatusCode::BAD_REQUEST, &body("username_not_occupied", None)),
            TransportError::InvalidIdentity { .. }
        ));
        assert!(matches!(
            map_error(StatusCode::NOT_FOUND, &body("", None)),
            TransportError::InvalidIdentity { .. }
        ));
    }

    #[test]
    fn everything_else_is_rpc() {
        let err = map_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ErrorBody {
                error: "INTERNAL".into(),
                message: Some("worker crashed".into()),
                retry_after: None,
            },
        );
        assert!(matches!(err, TransportError::Rpc { ref message } if message.contains("worker crashed")));
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let config = TransportConfig {
            base_url: "http://gateway.local/api/v1".into(),
            ..TransportConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.endpoint("channels/5/join").unwrap().as_str(),
            "http://gateway.local/api/v1/channels/5/join"
        );
    }
}
