//! Upstream transport seam.
//!
//! The router only looks at success/failure and the raw failure body. A
//! successful response is handed back to the caller as an undecoded byte
//! stream.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::utils::http::create_client;

pub type ByteStream = BoxStream<'static, Result<Bytes, String>>;

pub enum TransportOutcome {
    Success(ByteStream),
    /// `status` is `None` when no response arrived (connect error, timeout).
    Failure { status: Option<u16>, body: String },
    Cancelled,
}

impl std::fmt::Debug for TransportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(_) => f.write_str("Success(<stream>)"),
            Self::Failure { status, body } => {
                f.debug_struct("Failure").field("status", status).field("body", body).finish()
            },
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        payload: &Value,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> TransportOutcome;
}

/// JSON-over-HTTPS transport with bearer auth.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, String> {
        Ok(Self { client: create_client(timeout_secs)? })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post(&self, endpoint: &str, payload: &Value, access_token: &str) -> TransportOutcome {
        let response = match self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("[Transport] {} unreachable: {}", endpoint, e);
                return TransportOutcome::Failure {
                    status: e.status().map(|s| s.as_u16()),
                    body: e.to_string(),
                };
            },
        };

        let status = response.status();
        if status.is_success() {
            let stream = response.bytes_stream().map(|chunk| chunk.map_err(|e| e.to_string()));
            return TransportOutcome::Success(stream.boxed());
        }

        let body = response.text().await.unwrap_or_default();
        TransportOutcome::Failure { status: Some(status.as_u16()), body }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &Value,
        access_token: &str,
        cancel: &CancellationToken,
    ) -> TransportOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => TransportOutcome::Cancelled,
            outcome = self.post(endpoint, payload, access_token) => outcome,
        }
    }
}

/// Drain a byte stream into one buffer.
pub async fn collect_stream(mut stream: ByteStream) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_success_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: hello\n\n"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(10).unwrap();
        let endpoint = format!("{}/v1/generate", server.uri());
        let outcome =
            transport.send(&endpoint, &serde_json::json!({}), "tok", &CancellationToken::new()).await;

        let TransportOutcome::Success(stream) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(collect_stream(stream).await.unwrap(), b"data: hello\n\n");
    }

    #[tokio::test]
    async fn test_failure_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("retry after 5 seconds"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(10).unwrap();
        let outcome = transport
            .send(&server.uri(), &serde_json::json!({"q": 1}), "tok", &CancellationToken::new())
            .await;

        match outcome {
            TransportOutcome::Failure { status, body } => {
                assert_eq!(status, Some(429));
                assert_eq!(body, "retry after 5 seconds");
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = HttpTransport::new(10).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome =
            transport.send("http://127.0.0.1:9", &serde_json::json!({}), "tok", &cancel).await;
        assert!(matches!(outcome, TransportOutcome::Cancelled));
    }
}
