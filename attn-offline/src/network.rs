//! Outbound network access for the cache controller

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::cache::CachedResponse;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    Invalid(String),
}

/// An outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct NetRequest {
    pub method: String,
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl NetRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            content_type: None,
            body: Bytes::new(),
        }
    }
}

/// A response as received; any HTTP status is a response, not an error
#[derive(Debug, Clone, PartialEq)]
pub struct NetResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl NetResponse {
    pub fn into_cached(self) -> CachedResponse {
        CachedResponse::new(self.status, self.content_type, self.body)
    }
}

impl From<CachedResponse> for NetResponse {
    fn from(cached: CachedResponse) -> Self {
        Self {
            status: cached.status,
            content_type: cached.content_type,
            body: cached.body,
        }
    }
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: NetRequest) -> Result<NetResponse, NetworkError>;
}

/// reqwest-backed network
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("attn-offline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Invalid(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: NetRequest) -> Result<NetResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError::Invalid(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(classify)?;

        debug!(url = %request.url, status, bytes = body.len(), "Fetched");
        Ok(NetResponse {
            status,
            content_type,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout
    } else {
        NetworkError::Connection(err.to_string())
    }
}
