//! Best-effort device position
//!
//! Position never blocks a submission: when disabled, unsupported, denied or
//! slower than the configured timeout the coordinates are simply null.

use async_trait::async_trait;
use attn_common::config::GeolocationConfig;
use attn_common::models::Coordinates;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocationError {
    #[error("geolocation unsupported")]
    Unsupported,

    #[error("geolocation permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current position
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<(f64, f64), LocationError>;
}

/// Provider for devices without positioning
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_position(&self) -> Result<(f64, f64), LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Provider returning a configured fixed position (kiosks bolted to one spot)
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<(f64, f64), LocationError> {
        Ok((self.latitude, self.longitude))
    }
}

/// Resolve coordinates, swallowing every failure
pub async fn locate(provider: &dyn LocationProvider, config: &GeolocationConfig) -> Coordinates {
    if !config.enabled {
        return Coordinates::unknown();
    }

    match tokio::time::timeout(config.timeout(), provider.current_position()).await {
        Ok(Ok((latitude, longitude))) => {
            debug!(latitude, longitude, "Position acquired");
            Coordinates::known(latitude, longitude)
        }
        Ok(Err(e)) => {
            warn!("Geolocation error: {}", e);
            Coordinates::unknown()
        }
        Err(_) => {
            warn!("Geolocation timed out after {:?}", config.timeout());
            Coordinates::unknown()
        }
    }
}
