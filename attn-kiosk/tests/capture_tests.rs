//! Capture pipeline state machine and device lifetime tests

mod helpers;

use attn_common::config::{CameraConfig, FacingMode};
use attn_kiosk::capture::device::{CameraFault, StillImageCamera};
use attn_kiosk::capture::{CameraError, CapturePipeline, CaptureState};
use helpers::{write_test_photo, CountingCamera};
use std::sync::Arc;

fn pipeline(camera: &Arc<CountingCamera>) -> CapturePipeline {
    CapturePipeline::new(camera.clone(), &CameraConfig::default())
}

#[tokio::test]
async fn test_capture_releases_camera_and_holds_photo() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);

    pipeline.start().await.unwrap();
    assert_eq!(pipeline.state(), CaptureState::Streaming);
    assert_eq!(camera.live(), 1);

    let photo = pipeline.capture().await.unwrap();
    assert!(photo.size() > 0);
    assert!(photo.size() <= 500 * 1024);
    assert_eq!((photo.width, photo.height), (320, 240));
    assert!(photo.to_data_url().starts_with("data:image/jpeg;base64,"));

    assert_eq!(pipeline.state(), CaptureState::Captured);
    assert_eq!(pipeline.photo(), Some(&photo));
    assert_eq!(camera.live(), 0);
}

#[tokio::test]
async fn test_capture_requires_stream() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);

    assert_eq!(pipeline.capture().await.unwrap_err(), CameraError::NotStreaming);
    assert_eq!(pipeline.state(), CaptureState::Idle);
}

#[tokio::test]
async fn test_start_twice_opens_once() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);

    pipeline.start().await.unwrap();
    pipeline.start().await.unwrap();

    assert_eq!(camera.opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(camera.live(), 1);
}

#[tokio::test]
async fn test_reset_twice_is_idle_and_releases() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);

    pipeline.start().await.unwrap();
    pipeline.reset();
    pipeline.reset();

    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert!(!pipeline.has_photo());
    assert_eq!(camera.live(), 0);
}

#[tokio::test]
async fn test_retake_discards_photo() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);

    pipeline.start().await.unwrap();
    pipeline.capture().await.unwrap();
    assert!(pipeline.has_photo());

    pipeline.start().await.unwrap();
    assert_eq!(pipeline.state(), CaptureState::Streaming);
    assert!(!pipeline.has_photo());
    assert_eq!(camera.live(), 1);
}

#[tokio::test]
async fn test_stop_keeps_photo_state() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);

    pipeline.start().await.unwrap();
    pipeline.stop();
    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert_eq!(camera.live(), 0);

    pipeline.start().await.unwrap();
    pipeline.capture().await.unwrap();
    pipeline.stop();
    assert_eq!(pipeline.state(), CaptureState::Captured);
}

#[tokio::test]
async fn test_dropping_pipeline_releases_camera() {
    let camera = Arc::new(CountingCamera::default());
    {
        let mut pipeline = pipeline(&camera);
        pipeline.start().await.unwrap();
        assert_eq!(camera.live(), 1);
    }
    assert_eq!(camera.live(), 0);
}

#[tokio::test]
async fn test_permission_and_missing_device_are_classified() {
    let denied = Arc::new(CountingCamera::failing(CameraFault::NotAllowed(
        "NotAllowedError".into(),
    )));
    let err = pipeline(&denied).start().await.unwrap_err();
    assert!(matches!(err, CameraError::PermissionDenied(_)));

    let missing = Arc::new(CountingCamera::failing(CameraFault::NotFound(
        "NotFoundError".into(),
    )));
    let mut missing_pipeline = pipeline(&missing);
    let err = missing_pipeline.start().await.unwrap_err();
    assert!(matches!(err, CameraError::NotFound(_)));
    assert_eq!(missing_pipeline.state(), CaptureState::Idle);
}

#[tokio::test]
async fn test_unsupported_platform() {
    let camera = Arc::new(CountingCamera {
        unsupported: true,
        ..CountingCamera::default()
    });
    let err = pipeline(&camera).start().await.unwrap_err();
    assert!(matches!(err, CameraError::Unsupported(_)));
    assert_eq!(camera.opens.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_switch_camera_restarts_live_stream() {
    let camera = Arc::new(CountingCamera::default());
    let mut pipeline = pipeline(&camera);
    assert_eq!(pipeline.facing_mode(), FacingMode::User);

    pipeline.switch_camera().await.unwrap();
    assert_eq!(pipeline.facing_mode(), FacingMode::Environment);
    assert_eq!(pipeline.state(), CaptureState::Idle);

    pipeline.start().await.unwrap();
    pipeline.switch_camera().await.unwrap();
    assert_eq!(pipeline.facing_mode(), FacingMode::User);
    assert_eq!(pipeline.state(), CaptureState::Streaming);
    assert_eq!(camera.opens.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(camera.live(), 1);
}

#[tokio::test]
async fn test_still_image_camera_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_photo(dir.path());
    let mut pipeline = CapturePipeline::new(
        Arc::new(StillImageCamera::new(&path)),
        &CameraConfig::default(),
    );

    pipeline.start().await.unwrap();
    let photo = pipeline.capture().await.unwrap();

    assert_eq!((photo.width, photo.height), (160, 120));
    assert_eq!(photo.encode_attempts, 1);
    assert_eq!(photo.quality, 80);
}

#[tokio::test]
async fn test_tight_budget_downscales_photo() {
    let camera = Arc::new(CountingCamera::default());
    let config = CameraConfig {
        max_file_size: 1024,
        max_dimension: 160,
        ..CameraConfig::default()
    };
    let mut pipeline = CapturePipeline::new(camera.clone(), &config);

    pipeline.start().await.unwrap();
    let photo = pipeline.capture().await.unwrap();

    assert_eq!((photo.width, photo.height), (160, 120));
    assert!(photo.encode_attempts >= 2);
    assert!(photo.encode_attempts <= pipeline_attempt_bound(&config));
}

fn pipeline_attempt_bound(config: &CameraConfig) -> u32 {
    attn_kiosk::capture::compress::CompressionSettings::from(config).max_encode_attempts()
}
