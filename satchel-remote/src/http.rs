//! HTTP gateway implementation.
//!
//! Thin JSON-over-HTTP client for the Satchel server. Requests carry the
//! account's username and an Ed25519 signature over the request body, so
//! the server can attribute writes without holding any content keys.

use crate::error::{RemoteError, RemoteResult};
use crate::gateway::RemoteGateway;
use crate::protocol::{
    ChangeSet, ContentResponse, FetchChangesRequest, MetadataDiff, PushMetadataResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use satchel_crypto::{EncryptedBytes, SigningKey};
use satchel_types::{Cursor, FileId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Server base URL, e.g. `https://api.satchel.app`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.satchel.app".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Production [`RemoteGateway`] over HTTP.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    username: String,
    signing_key: SigningKey,
}

impl HttpGateway {
    /// Builds a gateway for one account.
    pub fn new(
        config: HttpGatewayConfig,
        username: impl Into<String>,
        signing_key: SigningKey,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            signing_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Signs the request body and POSTs it, decoding a JSON response.
    async fn post_signed<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
        not_found: Option<FileId>,
    ) -> RemoteResult<Resp> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| RemoteError::Protocol(format!("request encoding: {e}")))?;
        let signature = self.signing_key.sign(&payload);

        let response = self
            .client
            .post(self.url(path))
            .header("x-satchel-username", &self.username)
            .header("x-satchel-signature", hex_encode(&signature.to_bytes()))
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_transport)?;

        decode(response, not_found).await
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn map_transport(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    not_found: Option<FileId>,
) -> RemoteResult<T> {
    let status = response.status();
    match status {
        StatusCode::OK => response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Protocol(format!("response decoding: {e}"))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Unauthorized),
        StatusCode::NOT_FOUND => match not_found {
            Some(id) => Err(RemoteError::NotFound(id)),
            None => Err(RemoteError::Protocol("unexpected 404".to_string())),
        },
        StatusCode::CONFLICT => match not_found {
            Some(id) => Err(RemoteError::StaleDiff(id)),
            None => Err(RemoteError::Protocol("unexpected 409".to_string())),
        },
        s if s.is_server_error() => Err(RemoteError::Server(s.as_u16())),
        s => Err(RemoteError::Protocol(format!("unexpected status {s}"))),
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_changes(&self, since: Cursor) -> RemoteResult<ChangeSet> {
        debug!(since = since.value(), "fetching remote changes");
        self.post_signed("/v1/changes", &FetchChangesRequest { since }, None)
            .await
    }

    async fn push_metadata(&self, diff: &MetadataDiff) -> RemoteResult<Cursor> {
        debug!(id = %diff.new.id, "pushing metadata diff");
        let response: PushMetadataResponse = self
            .post_signed("/v1/metadata", diff, Some(diff.new.id))
            .await?;
        Ok(response.cursor)
    }

    async fn fetch_content(&self, id: FileId) -> RemoteResult<EncryptedBytes> {
        let response = self
            .client
            .get(self.url(&format!("/v1/content/{id}")))
            .header("x-satchel-username", &self.username)
            .send()
            .await
            .map_err(map_transport)?;
        let body: ContentResponse = decode(response, Some(id)).await?;
        EncryptedBytes::from_base64(&body.content)
            .map_err(|e| RemoteError::Protocol(format!("content envelope: {e}")))
    }

    async fn push_content(&self, id: FileId, content: &EncryptedBytes) -> RemoteResult<()> {
        let body = ContentResponse { content: content.to_base64() };
        let _: serde_json::Value = self
            .post_signed(&format!("/v1/content/{id}"), &body, Some(id))
            .await?;
        Ok(())
    }
}
