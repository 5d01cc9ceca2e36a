//! Camera device abstraction
//!
//! A [`CameraBackend`] opens [`FrameSource`]s. The pipeline wraps each source
//! in a [`CameraStream`], the only live handle to the device. Dropping the
//! stream releases the device, so every exit path (stop, reset, capture,
//! error, drop of the pipeline) frees the hardware.

use async_trait::async_trait;
use attn_common::config::{CameraConfig, FacingMode};
use image::RgbImage;
use std::path::PathBuf;
use tracing::debug;

/// Stream request sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Preferred width; the device may pick another
    pub width: u32,
    /// Preferred height; the device may pick another
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl From<&CameraConfig> for StreamConstraints {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            facing_mode: config.facing_mode,
        }
    }
}

/// Platform error classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraFault {
    /// The user or platform refused access
    NotAllowed(String),
    /// No device matched the request
    NotFound(String),
    /// Anything else the platform reports
    Other(String),
}

/// Platform camera access
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Whether this platform can open cameras at all
    fn is_supported(&self) -> bool {
        true
    }

    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn FrameSource>, CameraFault>;
}

/// An open device delivering frames
pub trait FrameSource: Send + Sync {
    /// Current frame at native resolution
    fn grab_frame(&mut self) -> Result<RgbImage, CameraFault>;

    /// Release the underlying device. Called exactly once.
    fn release(&mut self);
}

/// Owned handle to a live camera stream
pub struct CameraStream {
    source: Option<Box<dyn FrameSource>>,
    constraints: StreamConstraints,
}

impl CameraStream {
    pub(crate) fn new(source: Box<dyn FrameSource>, constraints: StreamConstraints) -> Self {
        Self {
            source: Some(source),
            constraints,
        }
    }

    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    pub(crate) fn grab_frame(&mut self) -> Result<RgbImage, CameraFault> {
        match self.source.as_mut() {
            Some(source) => source.grab_frame(),
            None => Err(CameraFault::Other("stream already released".to_string())),
        }
    }

    /// Release the device now
    pub(crate) fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
            debug!(facing_mode = ?self.constraints.facing_mode, "Camera released");
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("live", &self.source.is_some())
            .field("constraints", &self.constraints)
            .finish()
    }
}

/// Camera that serves a still image file as its only frame
///
/// Used by the command-line kiosk, where the photo comes from an external
/// capture tool. I/O error kinds map onto the platform classification.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CameraBackend for StillImageCamera {
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn FrameSource>, CameraFault> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CameraFault::NotAllowed(format!("{}: {}", self.path.display(), e))
            }
            std::io::ErrorKind::NotFound => {
                CameraFault::NotFound(format!("{}: {}", self.path.display(), e))
            }
            _ => CameraFault::Other(format!("{}: {}", self.path.display(), e)),
        })?;

        let frame = image::load_from_memory(&bytes)
            .map_err(|e| CameraFault::Other(format!("{}: {}", self.path.display(), e)))?
            .to_rgb8();

        debug!(
            path = %self.path.display(),
            width = frame.width(),
            height = frame.height(),
            requested = ?constraints,
            "Still image camera opened"
        );

        Ok(Box::new(StillFrame { frame: Some(frame) }))
    }
}

struct StillFrame {
    frame: Option<RgbImage>,
}

impl FrameSource for StillFrame {
    fn grab_frame(&mut self) -> Result<RgbImage, CameraFault> {
        self.frame
            .clone()
            .ok_or_else(|| CameraFault::Other("frame source released".to_string()))
    }

    fn release(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        released: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn grab_frame(&mut self) -> Result<RgbImage, CameraFault> {
            Ok(RgbImage::new(4, 4))
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn constraints() -> StreamConstraints {
        StreamConstraints::from(&CameraConfig::default())
    }

    #[test]
    fn test_drop_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let stream = CameraStream::new(
            Box::new(CountingSource {
                released: released.clone(),
            }),
            constraints(),
        );
        drop(stream);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_does_not_double_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let stream = CameraStream::new(
            Box::new(CountingSource {
                released: released.clone(),
            }),
            constraints(),
        );
        stream.stop();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_still_camera_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let camera = StillImageCamera::new(dir.path().join("nope.jpg"));
        let result = camera.open(&constraints()).await;
        assert!(matches!(result, Err(CameraFault::NotFound(_))));
    }

    #[tokio::test]
    async fn test_still_camera_undecodable_file_is_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let result = StillImageCamera::new(&path).open(&constraints()).await;
        assert!(matches!(result, Err(CameraFault::Other(_))));
    }

    #[tokio::test]
    async fn test_still_camera_serves_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(32, 24, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut source = StillImageCamera::new(&path)
            .open(&constraints())
            .await
            .unwrap();
        let frame = source.grab_frame().unwrap();
        assert_eq!(frame.dimensions(), (32, 24));

        source.release();
        assert!(source.grab_frame().is_err());
    }
}
