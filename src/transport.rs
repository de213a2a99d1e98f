use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, StatusCode};

use crate::{ColdStartError, RequestConfig, Result};

/// Status, content type and raw body of an HTTP response.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_owned),
            body: body.into(),
        }
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status, Some("application/json"), value.to_string())
    }
}

/// Performs a single HTTP exchange.
///
/// Implementations do not retry and do not enforce timeouts; the engine
/// wraps every call with the per-attempt timeout and the caller's
/// cancellation token.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &str, request: &RequestConfig) -> Result<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, target: &str, request: &RequestConfig) -> Result<RawResponse> {
        (**self).send(target, request).await
    }
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses a configured client, e.g. one with proxies, TLS roots or a
    /// custom user agent.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, target: &str, request: &RequestConfig) -> Result<RawResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), target)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(ColdStartError::Transport)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(ColdStartError::Transport)?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
