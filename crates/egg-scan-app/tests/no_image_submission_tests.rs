//! Integration tests for submitting with nothing staged.

mod common;

use std::sync::Arc;

use egg_scan_app::{AppError, UiAction};
use egg_scan_capture::SyntheticCamera;
use egg_scan_core::SubmissionStatus;
use egg_scan_ui::NO_IMAGE_TEXT;

#[test]
fn no_image_submission_tests_fails_locally_without_request() {
    let camera = SyntheticCamera::new();
    let transport = Arc::new(common::ScriptedTransport::new());
    let mut app = common::build_app(&camera, vec![], &transport);

    let error = app.submit().expect_err("submit should fail");
    assert!(matches!(error, AppError::NoImageSelected));
    assert_eq!(app.ui().status_text, NO_IMAGE_TEXT);
    assert_eq!(app.submission_status(), SubmissionStatus::Idle);
    assert!(transport.uploads().is_empty());
    assert_eq!(app.requests_issued(), 0);
}

#[test]
fn no_image_submission_tests_scan_again_discards_staged_file() {
    let camera = SyntheticCamera::new();
    let transport = Arc::new(common::ScriptedTransport::new());
    let mut app = common::build_app(&camera, vec![common::picked("egg.jpg")], &transport);

    app.dispatch(UiAction::ChooseFile)
        .expect("file should be chosen");
    app.dispatch(UiAction::ScanAgain)
        .expect("scan again should work");

    assert!(matches!(
        app.dispatch(UiAction::Submit),
        Err(AppError::NoImageSelected)
    ));
    assert!(transport.uploads().is_empty());
}

#[test]
fn no_image_submission_tests_open_camera_is_not_an_image() {
    let camera = SyntheticCamera::new();
    let transport = Arc::new(common::ScriptedTransport::new());
    let mut app = common::build_app(&camera, vec![], &transport);

    app.dispatch(UiAction::ToggleCamera)
        .expect("camera should open");
    assert!(matches!(app.submit(), Err(AppError::NoImageSelected)));
    assert!(transport.uploads().is_empty());
}
