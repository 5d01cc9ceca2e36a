//! Offline cache controller
//!
//! Intercepts GET requests for kiosk assets. One asset generation, named after
//! the configured version tag, is precached on install and becomes current on
//! activation, which deletes every other generation. Serving is cache-first:
//! a hit is returned immediately while a background task refetches the asset
//! into the bucket it was served from. A miss goes to the network and
//! status-200 responses land in the runtime bucket, which is capped at
//! `runtime_max_entries` by evicting its oldest entries. When both fail the
//! cached root document is served.
//!
//! Requests to API hosts are never cached.

use crate::cache::{CacheStorage, CachedResponse};
use crate::network::{NetRequest, NetResponse, Network};
use attn_common::config::OfflineConfig;
use attn_common::messages;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("precache of {url} failed: {reason}")]
    Precache { url: String, reason: String },

    #[error("install already in progress")]
    InstallInProgress,
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Parsed,
    Installing,
    /// Precached, waiting to activate
    Installed,
    Activating,
    Activated,
}

/// Messages accepted on the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    ClearCache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlReply {
    pub lifecycle: Lifecycle,
    pub buckets_deleted: usize,
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchSource {
    Cache,
    Network,
    PassThrough,
    Fallback,
    Offline,
}

impl FetchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchSource::Cache => "cache",
            FetchSource::Network => "network",
            FetchSource::PassThrough => "pass-through",
            FetchSource::Fallback => "fallback",
            FetchSource::Offline => "offline",
        }
    }
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub response: NetResponse,
    pub source: FetchSource,
    /// Background refetch started for a cache hit
    pub refresh: Option<JoinHandle<()>>,
}

/// Result of offering a request to the controller
#[derive(Debug)]
pub enum Intercept {
    /// Not intercepted; the caller sends it to the network untouched
    Bypass(NetRequest),
    Respond(FetchOutcome),
}

pub struct CacheController {
    config: OfflineConfig,
    origin: Url,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    lifecycle: RwLock<Lifecycle>,
}

impl CacheController {
    pub fn new(config: OfflineConfig, network: Arc<dyn Network>) -> Result<Self, CacheError> {
        let origin = Url::parse(&config.upstream).map_err(|e| CacheError::InvalidUrl {
            url: config.upstream.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            config,
            origin,
            storage: Arc::new(CacheStorage::new()),
            network,
            lifecycle: RwLock::new(Lifecycle::Parsed),
        })
    }

    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    pub fn network(&self) -> Arc<dyn Network> {
        Arc::clone(&self.network)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Current generation bucket name
    pub fn generation(&self) -> String {
        self.config.generation_name()
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read().await
    }

    /// Absolute URL of an upstream path
    pub fn resolve(&self, path: &str) -> Result<Url, CacheError> {
        self.origin.join(path).map_err(|e| CacheError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_api_host(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| self.config.api_hosts.iter().any(|api| host.contains(api.as_str())))
            .unwrap_or(false)
    }

    /// Precache the manifest into the current generation, then activate
    ///
    /// On failure nothing is written and the previous state is restored.
    pub async fn install(&self) -> Result<(), CacheError> {
        let previous = {
            let mut state = self.lifecycle.write().await;
            if *state == Lifecycle::Installing {
                return Err(CacheError::InstallInProgress);
            }
            std::mem::replace(&mut *state, Lifecycle::Installing)
        };
        let generation = self.generation();
        info!(generation = %generation, entries = self.config.precache.len(), "Installing");

        match self.precache().await {
            Ok(entries) => {
                self.storage.put_all(&generation, entries).await;
                *self.lifecycle.write().await = Lifecycle::Installed;
                info!(generation = %generation, "Installed");
            }
            Err(e) => {
                warn!("Install failed: {}", e);
                *self.lifecycle.write().await = previous;
                return Err(e);
            }
        }

        // Skip waiting on install
        self.activate().await;
        Ok(())
    }

    async fn precache(&self) -> Result<Vec<(String, CachedResponse)>, CacheError> {
        let mut entries = Vec::with_capacity(self.config.precache.len());

        for path in &self.config.precache {
            let url = self.resolve(path)?;
            let response = self
                .network
                .fetch(NetRequest::get(url.clone()))
                .await
                .map_err(|e| CacheError::Precache {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            if response.status != 200 {
                return Err(CacheError::Precache {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            entries.push((url.to_string(), response.into_cached()));
        }

        Ok(entries)
    }

    /// Make the current generation live and delete every other generation
    ///
    /// Returns the deleted bucket names.
    pub async fn activate(&self) -> Vec<String> {
        *self.lifecycle.write().await = Lifecycle::Activating;

        let generation = self.generation();
        let deleted = self
            .storage
            .retain(&[generation.as_str(), self.config.runtime_cache.as_str()])
            .await;
        for name in &deleted {
            info!(bucket = %name, "Deleted stale cache");
        }

        *self.lifecycle.write().await = Lifecycle::Activated;
        info!(generation = %generation, "Activated");
        deleted
    }

    pub async fn handle_message(&self, message: ControlMessage) -> ControlReply {
        debug!(?message, "Control message");
        let buckets_deleted = match message {
            ControlMessage::SkipWaiting => {
                if self.lifecycle().await == Lifecycle::Installed {
                    self.activate().await.len()
                } else {
                    0
                }
            }
            ControlMessage::ClearCache => {
                let count = self.storage.clear().await;
                info!(count, "All caches cleared");
                count
            }
        };

        ControlReply {
            lifecycle: self.lifecycle().await,
            buckets_deleted,
        }
    }

    /// Offer a request to the controller
    pub async fn handle_fetch(self: &Arc<Self>, request: NetRequest) -> Intercept {
        if !request.method.eq_ignore_ascii_case("GET") {
            return Intercept::Bypass(request);
        }
        if self.lifecycle().await != Lifecycle::Activated {
            return Intercept::Bypass(request);
        }

        if self.is_api_host(&request.url) {
            return Intercept::Respond(self.pass_through(request).await);
        }

        let mut url = request.url;
        url.set_fragment(None);
        let key = url.to_string();
        let generation = self.generation();

        if let Some((bucket, cached)) = self
            .storage
            .lookup(&[generation.as_str(), self.config.runtime_cache.as_str()], &key)
            .await
        {
            debug!(url = %key, bucket = %bucket, "Cache hit");
            let refresh = tokio::spawn(Arc::clone(self).refresh(bucket, url));
            return Intercept::Respond(FetchOutcome {
                response: cached.into(),
                source: FetchSource::Cache,
                refresh: Some(refresh),
            });
        }

        match self.network.fetch(NetRequest::get(url)).await {
            Ok(response) => {
                if response.status == 200 {
                    self.store(&self.config.runtime_cache, &key, response.clone().into_cached())
                        .await;
                }
                Intercept::Respond(FetchOutcome {
                    response,
                    source: FetchSource::Network,
                    refresh: None,
                })
            }
            Err(e) => {
                warn!(url = %key, "Network failed: {}", e);
                Intercept::Respond(self.fallback().await)
            }
        }
    }

    async fn pass_through(&self, request: NetRequest) -> FetchOutcome {
        let url = request.url.clone();
        match self.network.fetch(request).await {
            Ok(response) => FetchOutcome {
                response,
                source: FetchSource::PassThrough,
                refresh: None,
            },
            Err(e) => {
                warn!(url = %url, "API unreachable: {}", e);
                let body = serde_json::json!({ "success": false, "message": messages::OFFLINE });
                FetchOutcome {
                    response: NetResponse {
                        status: 503,
                        content_type: Some("application/json".to_string()),
                        body: body.to_string().into(),
                    },
                    source: FetchSource::Offline,
                    refresh: None,
                }
            }
        }
    }

    async fn fallback(&self) -> FetchOutcome {
        let generation = self.generation();
        let document = match self.resolve(&self.config.fallback_document) {
            Ok(url) => {
                self.storage
                    .lookup(
                        &[generation.as_str(), self.config.runtime_cache.as_str()],
                        url.as_str(),
                    )
                    .await
                    .map(|(_, hit)| hit)
            }
            Err(_) => None,
        };

        match document {
            Some(cached) => FetchOutcome {
                response: cached.into(),
                source: FetchSource::Fallback,
                refresh: None,
            },
            None => FetchOutcome {
                response: NetResponse {
                    status: 503,
                    content_type: Some("text/plain; charset=utf-8".to_string()),
                    body: messages::OFFLINE.into(),
                },
                source: FetchSource::Offline,
                refresh: None,
            },
        }
    }

    /// Write an entry; the runtime bucket stays within its cap
    async fn store(&self, bucket: &str, key: &str, response: CachedResponse) {
        if bucket == self.config.runtime_cache {
            self.storage
                .put_bounded(bucket, key, response, self.config.runtime_max_entries)
                .await;
        } else {
            self.storage.put(bucket, key, response).await;
        }
    }

    /// Refetch a hit into the bucket it came from; failures only log
    async fn refresh(self: Arc<Self>, bucket: String, url: Url) {
        let key = url.to_string();
        match self.network.fetch(NetRequest::get(url)).await {
            Ok(response) if response.status == 200 => {
                self.store(&bucket, &key, response.into_cached()).await;
                debug!(url = %key, bucket = %bucket, "Background refresh stored");
            }
            Ok(response) => {
                debug!(url = %key, status = response.status, "Background refresh skipped");
            }
            Err(e) => {
                debug!(url = %key, "Background refresh failed: {}", e);
            }
        }
    }
}
