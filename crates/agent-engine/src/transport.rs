//! Batch delivery over HTTP: JSON body, gzip, optional HMAC signature,
//! exponential backoff on transient failures.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};

use metrod_core::{MetricSample, compress, sign};

use crate::api::AgentConfig;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_INITIAL: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(5);

/// Failures surfaced by a delivery backend after its internal retry budget
/// is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The batch could not be serialized.
    #[error("serialize batch: {0}")]
    Encode(#[from] serde_json::Error),
    /// The payload could not be compressed.
    #[error("compress batch: {0}")]
    Compress(#[from] std::io::Error),
    /// The request never produced a response.
    #[error("send batch: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered with an error status.
    #[error("server rejected batch: http {0}")]
    Status(reqwest::StatusCode),
}

impl TransportError {
    fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status(status) => status.is_server_error(),
            _ => false,
        }
    }
}

/// Delivery backend for metric batches.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ship one batch. Implementations retry transient failures internally
    /// and return the terminal outcome.
    async fn update(&self, batch: &[MetricSample]) -> Result<(), TransportError>;
}

/// The HTTP transport: POSTs gzip-compressed JSON batches to `/updates/`.
#[derive(Debug)]
pub struct HttpSender {
    http: reqwest::Client,
    endpoint: Url,
    key: Option<String>,
    client_ip: Option<IpAddr>,
}

impl HttpSender {
    /// Build a sender for `config.server_url`. The `grpc` scheme parses as a
    /// valid URL but has no transport yet.
    pub fn new(config: &AgentConfig) -> anyhow::Result<Self> {
        match config.server_url.scheme() {
            "http" | "https" => {}
            "grpc" => anyhow::bail!("grpc transport is not implemented"),
            other => anyhow::bail!("unsupported server url scheme {other:?}"),
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let endpoint = config.server_url.join("updates/")?;

        Ok(Self {
            http,
            endpoint,
            key: config.key.clone(),
            client_ip: config.client_ip,
        })
    }

    async fn post_once(
        &self,
        body: Vec<u8>,
        digest: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .body(body);
        if let Some(digest) = digest {
            request = request.header(sign::HASH_HEADER, digest);
        }
        if let Some(ip) = self.client_ip {
            request = request.header("X-Real-IP", ip.to_string());
        }

        let response = request.send().await?;
        if response.status().as_u16() >= 400 {
            return Err(TransportError::Status(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpSender {
    async fn update(&self, batch: &[MetricSample]) -> Result<(), TransportError> {
        let raw = serde_json::to_vec(batch)?;
        // Signed over the raw JSON, before compression.
        let digest = self.key.as_deref().map(|key| sign::digest(key, &raw));
        let body = compress::gzip(&raw)?;

        let mut wait = RETRY_INITIAL;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.post_once(body.clone(), digest.as_deref()).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < RETRY_ATTEMPTS && err.is_transient() => {
                    tracing::debug!(attempt, error = %err, "transient delivery failure, backing off");
                    tokio::time::sleep(wait).await;
                    wait = (wait * 2).min(RETRY_MAX);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> AgentConfig {
        AgentConfig {
            server_url: Url::parse(address).unwrap(),
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            workers: 1,
            key: None,
            client_ip: None,
        }
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(HttpSender::new(&config("http://localhost:8080")).is_ok());
        assert!(HttpSender::new(&config("https://metrics.example.com")).is_ok());
    }

    #[test]
    fn rejects_grpc_as_not_implemented() {
        let err = HttpSender::new(&config("grpc://localhost:8080")).unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(HttpSender::new(&config("ftp://localhost:8080")).is_err());
    }

    #[test]
    fn status_errors_classify_transient() {
        assert!(TransportError::Status(reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(!TransportError::Status(reqwest::StatusCode::BAD_REQUEST).is_transient());
    }
}
