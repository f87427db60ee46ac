//! Client of the aggregation server.
use async_trait::async_trait;
use fedkick_core::{Identity, Model, UpdateAck, UpdateRequest};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use thiserror::Error;

/// Errors of [`ModelClient`] calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request did not produce an HTTP response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("Request failed: {status} {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Returns `true` only for transport failures.
    ///
    /// Once the server has answered, whatever the status, the request is not
    /// sent again: a stored delta is a new record on every delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status of the response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Access to the model and update endpoints.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Fetches the current model of `who`.
    async fn fetch_model(&self, who: &Identity) -> Result<Model, ClientError>;

    /// Uploads one delta.
    async fn upload_delta(&self, req: &UpdateRequest) -> Result<UpdateAck, ClientError>;
}

/// Bounded retries with linearly increasing backoff.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub retries: usize,

    /// Backoff before retry `k` (1-based) is `k * backoff_ms`.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Policy of model reads.
    pub fn model_read() -> Self {
        Self {
            retries: 2,
            backoff_ms: 500,
        }
    }

    /// Policy of delta uploads.
    pub fn upload() -> Self {
        Self {
            retries: 2,
            backoff_ms: 750,
        }
    }

    /// Runs `f` until it succeeds, fails with a non-retryable error or the
    /// retries are exhausted.
    pub async fn run<T, F, Fut>(&self, what: &str, mut f: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(self.backoff_ms * attempt as u64);
                    warn!("{} failed ({}), retry {} in {:?}", what, e, attempt, backoff);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Configuration of [`HttpModelClient`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HttpModelClientConfig {
    /// Base URL of the server, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,

    /// Retries of `GET /model`.
    pub model_retry: RetryPolicy,

    /// Retries of `POST /update`.
    pub upload_retry: RetryPolicy,

    /// Timeout of a single request in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            model_retry: RetryPolicy::model_read(),
            upload_retry: RetryPolicy::upload(),
            timeout_ms: 10_000,
        }
    }
}

/// [`ModelClient`] over HTTP.
pub struct HttpModelClient {
    client: Client,
    config: HttpModelClientConfig,
}

impl HttpModelClient {
    /// Creates the client.
    pub fn new(config: HttpModelClientConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn fetch_model(&self, who: &Identity) -> Result<Model, ClientError> {
        let url = self.url("model");
        self.config
            .model_retry
            .run("GET /model", || async {
                debug!("GET {}?who={}", url, who);
                let resp = self
                    .client
                    .get(&url)
                    .query(&[("who", who.as_str())])
                    .send()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                Self::decode(resp).await
            })
            .await
    }

    async fn upload_delta(&self, req: &UpdateRequest) -> Result<UpdateAck, ClientError> {
        let url = self.url("update");
        self.config
            .upload_retry
            .run("POST /update", || async {
                let resp = self
                    .client
                    .post(&url)
                    .json(req)
                    .send()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
                Self::decode(resp).await
            })
            .await
    }
}
