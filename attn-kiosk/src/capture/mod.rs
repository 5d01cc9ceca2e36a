//! Camera capture and compression pipeline
//!
//! State machine over Idle, Streaming and Captured. The pipeline owns the
//! only [`CameraStream`] handle while Streaming, so a second stream can never
//! be opened alongside it. Encoding runs on the blocking pool.

pub mod compress;
pub mod device;

use crate::capture::compress::{CompressionSettings, EncodedImage};
use crate::capture::device::{CameraBackend, CameraFault, CameraStream, StreamConstraints};
use attn_common::config::{CameraConfig, FacingMode};
use attn_common::messages;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Capture pipeline errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera unsupported: {0}")]
    Unsupported(String),

    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("camera not found: {0}")]
    NotFound(String),

    #[error("camera is not streaming")]
    NotStreaming,

    #[error("frame grab failed: {0}")]
    Frame(String),

    #[error("photo encoding failed: {0}")]
    Encode(String),
}

impl CameraError {
    /// Text for the presentation layer
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::Unsupported(_) => messages::CAMERA_NOT_SUPPORTED,
            CameraError::PermissionDenied(_) => messages::CAMERA_PERMISSION_DENIED,
            CameraError::NotFound(_) => messages::CAMERA_NOT_FOUND,
            CameraError::NotStreaming => messages::CAMERA_NOT_STREAMING,
            CameraError::Frame(_) | CameraError::Encode(_) => messages::CAPTURE_FAILED,
        }
    }
}

impl From<CameraFault> for CameraError {
    fn from(fault: CameraFault) -> Self {
        match fault {
            CameraFault::NotAllowed(detail) => CameraError::PermissionDenied(detail),
            CameraFault::NotFound(detail) => CameraError::NotFound(detail),
            CameraFault::Other(detail) => CameraError::Unsupported(detail),
        }
    }
}

/// Observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Streaming,
    Captured,
}

/// Size-bounded JPEG ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// JPEG quality percent of the accepted encode
    pub quality: u8,
    pub encode_attempts: u32,
}

impl CapturedPhoto {
    pub fn size(&self) -> usize {
        self.jpeg.len()
    }

    /// `data:image/jpeg;base64,...` form carried in the submission payload
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.jpeg))
    }
}

impl From<EncodedImage> for CapturedPhoto {
    fn from(encoded: EncodedImage) -> Self {
        Self {
            jpeg: encoded.bytes,
            width: encoded.width,
            height: encoded.height,
            quality: encoded.quality,
            encode_attempts: encoded.encode_attempts,
        }
    }
}

enum Slot {
    Idle,
    Streaming(CameraStream),
    Captured(CapturedPhoto),
}

/// Camera capture state machine
pub struct CapturePipeline {
    backend: Arc<dyn CameraBackend>,
    constraints: StreamConstraints,
    settings: CompressionSettings,
    slot: Slot,
}

impl CapturePipeline {
    pub fn new(backend: Arc<dyn CameraBackend>, config: &CameraConfig) -> Self {
        Self {
            backend,
            constraints: StreamConstraints::from(config),
            settings: CompressionSettings::from(config),
            slot: Slot::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        match self.slot {
            Slot::Idle => CaptureState::Idle,
            Slot::Streaming(_) => CaptureState::Streaming,
            Slot::Captured(_) => CaptureState::Captured,
        }
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.constraints.facing_mode
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    pub fn photo(&self) -> Option<&CapturedPhoto> {
        match &self.slot {
            Slot::Captured(photo) => Some(photo),
            _ => None,
        }
    }

    pub fn has_photo(&self) -> bool {
        self.photo().is_some()
    }

    /// Open the camera
    ///
    /// No-op while already streaming. From Captured the held photo is
    /// discarded first (retake).
    pub async fn start(&mut self) -> Result<(), CameraError> {
        match self.slot {
            Slot::Streaming(_) => {
                debug!("Camera already streaming");
                return Ok(());
            }
            Slot::Captured(_) => {
                debug!("Discarding captured photo for retake");
                self.slot = Slot::Idle;
            }
            Slot::Idle => {}
        }

        if !self.backend.is_supported() {
            return Err(CameraError::Unsupported(
                "platform has no camera support".to_string(),
            ));
        }

        let source = self.backend.open(&self.constraints).await.map_err(|fault| {
            warn!("Camera start failed: {:?}", fault);
            CameraError::from(fault)
        })?;

        self.slot = Slot::Streaming(CameraStream::new(source, self.constraints));
        info!(facing_mode = ?self.constraints.facing_mode, "Camera streaming");
        Ok(())
    }

    /// Snapshot the current frame, release the camera and compress
    ///
    /// The photo is held for submission; the returned copy is the caller's.
    pub async fn capture(&mut self) -> Result<CapturedPhoto, CameraError> {
        let mut stream = match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Streaming(stream) => stream,
            other => {
                self.slot = other;
                return Err(CameraError::NotStreaming);
            }
        };

        let frame = match stream.grab_frame() {
            Ok(frame) => frame,
            Err(fault) => {
                warn!("Frame grab failed: {:?}", fault);
                self.slot = Slot::Streaming(stream);
                return Err(CameraError::Frame(format!("{:?}", fault)));
            }
        };
        stream.stop();

        let settings = self.settings.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            compress::encode_within_budget(&frame, &settings)
        })
        .await
        .map_err(|e| CameraError::Encode(e.to_string()))?
        .map_err(|e| CameraError::Encode(e.to_string()))?;

        if encoded.within(self.settings.max_bytes) {
            debug!(
                bytes = encoded.bytes.len(),
                quality = encoded.quality,
                attempts = encoded.encode_attempts,
                "Photo captured"
            );
        } else {
            warn!(
                bytes = encoded.bytes.len(),
                budget = self.settings.max_bytes,
                quality = encoded.quality,
                "Photo still over budget at quality floor, accepting"
            );
        }

        let photo = CapturedPhoto::from(encoded);
        self.slot = Slot::Captured(photo.clone());
        Ok(photo)
    }

    /// Release the camera without capturing; a held photo is kept
    pub fn stop(&mut self) {
        if let Slot::Streaming(_) = self.slot {
            // Dropping the stream releases the device
            self.slot = Slot::Idle;
        }
    }

    /// Back to Idle: release the camera and drop any photo
    pub fn reset(&mut self) {
        self.slot = Slot::Idle;
    }

    /// Toggle front/rear camera, restarting a live stream
    pub async fn switch_camera(&mut self) -> Result<(), CameraError> {
        self.constraints.facing_mode = self.constraints.facing_mode.toggled();
        let was_streaming = self.state() == CaptureState::Streaming;
        self.stop();
        if was_streaming {
            self.start().await?;
        }
        Ok(())
    }
}
