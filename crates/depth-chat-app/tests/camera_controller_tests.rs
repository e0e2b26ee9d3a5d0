//! Integration tests for routing camera captures into the staging area.

use std::sync::Arc;

use depth_chat_app::{CameraController, lock_state, new_shared_state};
use depth_chat_camera::{
    CameraError, CameraState, FacingMode, SyntheticBehavior, SyntheticCamera,
};
use depth_chat_normalize::NormalizeSpec;
use image::GenericImageView;

#[tokio::test]
async fn camera_controller_tests_capture_stages_square_jpeg() {
    let backend = Arc::new(SyntheticCamera::new(640, 480));
    let controller =
        CameraController::new(backend.clone(), FacingMode::Environment, NormalizeSpec::camera());
    let state = new_shared_state();

    controller.toggle().await.expect("open should succeed");
    assert_eq!(controller.state(), CameraState::Open);
    assert_eq!(backend.live_tracks(), 1);

    let staged = controller
        .capture_into(&state, 42)
        .expect("capture should succeed");
    assert!(staged);
    assert_eq!(controller.state(), CameraState::Closed);
    assert_eq!(backend.live_tracks(), 0);

    let guard = lock_state(&state);
    assert_eq!(guard.staging.len(), 1);
    let image = &guard.staging.images()[0];
    assert_eq!(image.name, "cam_42.jpg");
    let decoded = image::load_from_memory(&image.bytes()).expect("capture should be a jpeg");
    assert_eq!(decoded.dimensions(), (384, 384));
}

#[tokio::test]
async fn camera_controller_tests_capture_while_closed_stages_nothing() {
    let controller = CameraController::new(
        Arc::new(SyntheticCamera::default()),
        FacingMode::Environment,
        NormalizeSpec::camera(),
    );
    let state = new_shared_state();

    let staged = controller
        .capture_into(&state, 1)
        .expect("closed capture should not fail");
    assert!(!staged);
    assert!(lock_state(&state).staging.is_empty());
}

#[tokio::test]
async fn camera_controller_tests_denied_permission_keeps_camera_closed() {
    let controller = CameraController::new(
        Arc::new(SyntheticCamera::with_behavior(8, 8, SyntheticBehavior::Deny)),
        FacingMode::User,
        NormalizeSpec::camera(),
    );

    let result = controller.open().await;
    assert!(matches!(result, Err(CameraError::PermissionDenied)));
    assert_eq!(controller.state(), CameraState::Closed);
}

#[tokio::test]
async fn camera_controller_tests_toggle_twice_releases_stream() {
    let backend = Arc::new(SyntheticCamera::new(32, 32));
    let controller =
        CameraController::new(backend.clone(), FacingMode::Environment, NormalizeSpec::camera());

    controller.toggle().await.expect("open should succeed");
    controller.toggle().await.expect("close should succeed");
    assert_eq!(controller.state(), CameraState::Closed);
    assert_eq!(backend.live_tracks(), 0);

    controller.open().await.expect("reopen should succeed");
    controller.open().await.expect("second open is a no-op");
    assert_eq!(backend.live_tracks(), 1);
}
