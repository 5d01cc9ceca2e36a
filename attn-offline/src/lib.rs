//! attn-offline library - offline asset cache for the kiosk
//!
//! Serves the kiosk's static assets from an upstream origin through the
//! [`controller::CacheController`], so the kiosk keeps loading while the
//! network is down.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Url;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod cache;
pub mod controller;
pub mod network;

use crate::controller::{CacheController, ControlMessage, Intercept};
use crate::network::{NetRequest, NetResponse, Network};

/// Header naming where a response came from
pub const SOURCE_HEADER: &str = "x-attn-cache";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<CacheController>,
}

impl AppState {
    pub fn new(controller: Arc<CacheController>) -> Self {
        Self { controller }
    }
}

/// Build application router
///
/// Everything not matched by a control route goes through the controller.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/__sw/message", post(message))
        .fallback(intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let lifecycle = state.controller.lifecycle().await;
    Json(json!({
        "status": "ok",
        "module": "attn-offline",
        "version": env!("CARGO_PKG_VERSION"),
        "generation": state.controller.generation(),
        "lifecycle": lifecycle,
    }))
}

async fn message(
    State(state): State<AppState>,
    Json(message): Json<ControlMessage>,
) -> impl IntoResponse {
    Json(state.controller.handle_message(message).await)
}

/// Map an incoming URI onto the URL it asks for
///
/// Absolute-form URIs (proxy requests) are taken as-is; origin-form paths
/// resolve against the upstream origin.
fn target_url(controller: &CacheController, uri: &Uri) -> Option<Url> {
    if uri.authority().is_some() {
        return Url::parse(&uri.to_string()).ok();
    }
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    controller.resolve(path).ok()
}

async fn intercept(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(url) = target_url(&state.controller, &uri) else {
        return (StatusCode::BAD_REQUEST, "invalid request target").into_response();
    };

    let request = NetRequest {
        method: method.as_str().to_string(),
        url,
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };

    match state.controller.handle_fetch(request).await {
        Intercept::Respond(outcome) => into_response(outcome.response, outcome.source.as_str()),
        Intercept::Bypass(request) => {
            let url = request.url.clone();
            match state.controller.network().fetch(request).await {
                Ok(response) => into_response(response, "bypass"),
                Err(e) => {
                    warn!(url = %url, "Bypass request failed: {}", e);
                    (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
                }
            }
        }
    }
}

fn into_response(response: NetResponse, source: &'static str) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder()
        .status(status)
        .header(SOURCE_HEADER, HeaderValue::from_static(source));
    if let Some(content_type) = response
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
