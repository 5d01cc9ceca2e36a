//! Test helpers for attn-offline: a scriptable in-memory network

#![allow(dead_code)]

use async_trait::async_trait;
use attn_common::config::OfflineConfig;
use attn_offline::controller::CacheController;
use attn_offline::network::{NetRequest, NetResponse, Network, NetworkError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const ORIGIN: &str = "http://kiosk.local";

/// Network serving scripted pages; unknown URLs are 404
pub struct FakeNetwork {
    pages: Mutex<HashMap<String, (u16, String)>>,
    online: AtomicBool,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Serve `body` for an origin path or absolute URL
    pub fn serve(&self, target: &str, status: u16, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(absolute(target), (status, body.to_string()));
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Requests received, as (method, url)
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, target: &str) -> usize {
        let url = absolute(target);
        self.requests().iter().filter(|(_, u)| *u == url).count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: NetRequest) -> Result<NetResponse, NetworkError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(NetworkError::Connection("network unreachable".to_string()));
        }
        let url = request.url.to_string();
        self.requests
            .lock()
            .unwrap()
            .push((request.method.clone(), url.clone()));

        let (status, body) = self
            .pages
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or((404, "not found".to_string()));

        Ok(NetResponse {
            status,
            content_type: Some("text/html".to_string()),
            body: body.into(),
        })
    }
}

pub fn absolute(target: &str) -> String {
    if target.starts_with("http") {
        target.to_string()
    } else {
        format!("{}{}", ORIGIN, target)
    }
}

pub fn offline_config() -> OfflineConfig {
    OfflineConfig {
        upstream: ORIGIN.to_string(),
        ..OfflineConfig::default()
    }
}

/// Network serving every precache entry as "<path> v1"
pub fn seeded_network(config: &OfflineConfig) -> Arc<FakeNetwork> {
    let network = FakeNetwork::new();
    for path in &config.precache {
        network.serve(path, 200, &format!("{} v1", path));
    }
    network
}

pub fn controller(config: OfflineConfig, network: &Arc<FakeNetwork>) -> Arc<CacheController> {
    Arc::new(CacheController::new(config, network.clone()).unwrap())
}
