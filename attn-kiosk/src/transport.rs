//! Transport client for the attendance API
//!
//! The remote is action-dispatch over a single URL: every call is a POST of
//! `{"action": <name>, ...params}` to the configured endpoint.
//!
//! Failure handling:
//! - The per-call timeout cancels the in-flight request and is never retried.
//! - Any other failure (non-2xx status, connection error, malformed body) is
//!   retried after a fixed delay until `retry_attempts` extra attempts are used.
//! - Callers only see [`TransportError`]; detail is logged here.

use attn_common::config::ApiConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

/// One named remote operation with its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAction {
    pub name: String,
    pub params: Map<String, Value>,
}

impl RemoteAction {
    /// Action without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Action whose params are the fields of `params`
    ///
    /// `params` must serialize to a JSON object.
    pub fn with_params<P: Serialize>(
        name: impl Into<String>,
        params: &P,
    ) -> Result<Self, serde_json::Error> {
        let name = name.into();
        match serde_json::to_value(params)? {
            Value::Object(params) => Ok(Self { name, params }),
            other => Err(serde::ser::Error::custom(format!(
                "params for {} must be an object, got {}",
                name, other
            ))),
        }
    }

    /// Wire body: `{"action": name, ...params}`
    pub fn body(&self) -> Value {
        let mut body = Map::with_capacity(self.params.len() + 1);
        body.insert("action".to_string(), Value::String(self.name.clone()));
        for (key, value) in &self.params {
            if key != "action" {
                body.insert(key.clone(), value.clone());
            }
        }
        Value::Object(body)
    }
}

/// Why a single attempt failed (retryable)
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed response body: {0}")]
    Body(String),
}

/// Transport client errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call exceeded the fixed timeout and was cancelled
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Every allowed attempt failed
    #[error("request failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// HTTP client with timeout and bounded fixed-delay retry
#[derive(Debug, Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    health_timeout: Duration,
}

impl TransportClient {
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("attn-kiosk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
            health_timeout: config.health_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upper bound on network calls for one logical call
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts + 1
    }

    /// POST an action and return the parsed JSON body
    pub async fn send(&self, action: &RemoteAction) -> Result<Value, TransportError> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!("remote_action", action = %action.name, %request_id);
        self.send_with_retry(action.body()).instrument(span).await
    }

    async fn send_with_retry(&self, body: Value) -> Result<Value, TransportError> {
        let max_attempts = self.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            debug!(attempt, max_attempts, "Sending request");

            match tokio::time::timeout(self.timeout, self.attempt(&body)).await {
                Err(_) => {
                    warn!(attempt, timeout = ?self.timeout, "Request timed out, not retrying");
                    return Err(TransportError::Timeout(self.timeout));
                }
                Ok(Ok(value)) => {
                    debug!(attempts_used = attempt, "Request succeeded");
                    return Ok(value);
                }
                Ok(Err(err)) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        error = %err,
                        "Request failed, retrying in {:?}",
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Ok(Err(err)) => {
                    error!(attempts = attempt, error = %err, "Request failed, attempts exhausted");
                    return Err(TransportError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }

    async fn attempt(&self, body: &Value) -> Result<Value, AttemptError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AttemptError::Body(e.to_string()))
    }

    /// Bare GET against the endpoint with a short timeout
    ///
    /// Never fails: any error means "unreachable".
    pub async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(&self.endpoint)
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }
}
