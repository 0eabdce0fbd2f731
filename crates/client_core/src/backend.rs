//! HTTP client for the external recognition backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use shared::{
    error::WorkflowError,
    protocol::{
        AckResponse, ProtocolError, RegisterRequest, StatsResponse, UploadDatasetRequest,
        VerifyRequest, VerifyResponse,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Base URL of the recognition backend when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed response from {endpoint} (http {status}): {source}")]
    Malformed {
        endpoint: String,
        status: u16,
        #[source]
        source: ProtocolError,
    },
}

impl From<BackendError> for WorkflowError {
    fn from(_: BackendError) -> Self {
        WorkflowError::connectivity()
    }
}

#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn stats(&self) -> Result<StatsResponse, BackendError>;
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, BackendError>;
    async fn register(&self, request: &RegisterRequest) -> Result<AckResponse, BackendError>;
    async fn upload_dataset(
        &self,
        request: &UploadDatasetRequest,
    ) -> Result<AckResponse, BackendError>;
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let parsed = Url::parse(base_url.trim()).map_err(|err| BackendError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Client)?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn read_body(
        &self,
        endpoint: String,
        request: reqwest::RequestBuilder,
    ) -> Result<(String, u16, Vec<u8>), BackendError> {
        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        debug!(%endpoint, status, bytes = body.len(), "backend responded");
        Ok((endpoint, status, body.to_vec()))
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        parse: fn(&[u8]) -> Result<T, ProtocolError>,
    ) -> Result<T, BackendError>
    where
        B: Serialize + Sync,
    {
        let endpoint = self.endpoint(path);
        let request = self.http.post(&endpoint).json(body);
        let (endpoint, status, bytes) = self.read_body(endpoint, request).await?;
        interpret(endpoint, status, &bytes, parse)
    }
}

fn interpret<T>(
    endpoint: String,
    status: u16,
    bytes: &[u8],
    parse: fn(&[u8]) -> Result<T, ProtocolError>,
) -> Result<T, BackendError> {
    parse(bytes).map_err(|source| {
        warn!(%endpoint, status, "unparseable backend response: {source}");
        BackendError::Malformed {
            endpoint,
            status,
            source,
        }
    })
}

#[async_trait]
impl RecognitionBackend for HttpBackend {
    async fn stats(&self) -> Result<StatsResponse, BackendError> {
        let endpoint = self.endpoint("stats");
        let request = self.http.get(&endpoint);
        let (endpoint, status, bytes) = self.read_body(endpoint, request).await?;
        interpret(endpoint, status, &bytes, StatsResponse::from_slice)
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, BackendError> {
        self.post_json("verify", request, VerifyResponse::from_slice)
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AckResponse, BackendError> {
        self.post_json("register", request, AckResponse::from_slice)
            .await
    }

    async fn upload_dataset(
        &self,
        request: &UploadDatasetRequest,
    ) -> Result<AckResponse, BackendError> {
        self.post_json("upload-dataset", request, AckResponse::from_slice)
            .await
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
