//! Test helpers for attn-kiosk integration tests
//!
//! An in-process attendance API on an ephemeral port with a scripted
//! responder, plus camera and fixture utilities.

#![allow(dead_code)]

use async_trait::async_trait;
use attn_common::config::ApiConfig;
use attn_kiosk::capture::device::{CameraBackend, CameraFault, FrameSource, StreamConstraints};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use image::RgbImage;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the mock API does with one request
pub enum Reply {
    Json(Value),
    Status(u16),
    Slow(Duration, Value),
    Malformed,
}

type Responder = dyn Fn(usize, &Value) -> Reply + Send + Sync;

#[derive(Clone)]
struct MockState {
    responder: Arc<Responder>,
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

/// Handle to a running mock API
pub struct MockApi {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl MockApi {
    /// POST requests received so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    /// Action names in arrival order
    pub fn actions(&self) -> Vec<String> {
        self.bodies()
            .iter()
            .map(|b| b["action"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Fast-retry client config pointed at this server
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            endpoint: self.endpoint(),
            timeout_ms: 2_000,
            retry_attempts: 2,
            retry_delay_ms: 10,
            health_timeout_ms: 500,
        }
    }
}

/// Start a mock API; the responder gets the 0-based request index and body
pub async fn spawn_api<F>(responder: F) -> MockApi
where
    F: Fn(usize, &Value) -> Reply + Send + Sync + 'static,
{
    let state = MockState {
        responder: Arc::new(responder),
        hits: Arc::new(AtomicUsize::new(0)),
        bodies: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/", post(handle).get(|| async { StatusCode::OK }))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockApi {
        addr,
        hits: state.hits,
        bodies: state.bodies,
    }
}

async fn handle(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let index = state.hits.fetch_add(1, Ordering::SeqCst);
    state.bodies.lock().unwrap().push(body.clone());

    match (state.responder)(index, &body) {
        Reply::Json(value) => Json(value).into_response(),
        Reply::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Reply::Slow(delay, value) => {
            tokio::time::sleep(delay).await;
            Json(value).into_response()
        }
        Reply::Malformed => (StatusCode::OK, "<html>upstream error</html>").into_response(),
    }
}

/// Address nothing is listening on
pub async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

pub fn ok(data: Value) -> Reply {
    Reply::Json(json!({ "success": true, "data": data }))
}

pub fn fail(message: &str) -> Reply {
    Reply::Json(json!({ "success": false, "message": message }))
}

pub fn worker_json(dni: &str, name: &str) -> Value {
    json!({ "dni": dni, "nombreCompleto": name })
}

pub fn result_json(dni: &str, success: bool, message: &str) -> Value {
    json!({ "dni": dni, "nombre": format!("Worker {}", dni), "success": success, "message": message })
}

/// Write a small PNG usable as a still camera frame
pub fn write_test_photo(dir: &Path) -> PathBuf {
    let path = dir.join("frame.png");
    RgbImage::from_fn(160, 120, |x, y| image::Rgb([x as u8, y as u8, 128]))
        .save(&path)
        .unwrap();
    path
}

/// Camera backend counting opens and releases
#[derive(Default)]
pub struct CountingCamera {
    pub opens: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub fault: Option<CameraFault>,
    pub unsupported: bool,
}

impl CountingCamera {
    pub fn failing(fault: CameraFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    /// Streams currently holding the device
    pub fn live(&self) -> usize {
        self.opens.load(Ordering::SeqCst) - self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraBackend for CountingCamera {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn open(&self, _constraints: &StreamConstraints) -> Result<Box<dyn FrameSource>, CameraFault> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingFrames {
            releases: self.releases.clone(),
        }))
    }
}

struct CountingFrames {
    releases: Arc<AtomicUsize>,
}

impl FrameSource for CountingFrames {
    fn grab_frame(&mut self) -> Result<RgbImage, CameraFault> {
        Ok(RgbImage::from_fn(320, 240, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        }))
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
