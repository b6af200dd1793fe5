//! Tests the capture mode transition function over every event.

use egg_scan_core::{CaptureMode, ModeTransition};

const MODES: [CaptureMode; 3] = [
    CaptureMode::Idle,
    CaptureMode::CameraActive,
    CaptureMode::PreviewHeld,
];

const TRANSITIONS: [ModeTransition; 4] = [
    ModeTransition::CameraOpened,
    ModeTransition::CameraClosed,
    ModeTransition::ImageStaged,
    ModeTransition::Cleared,
];

#[test]
fn capture_mode_transition_tests_targets_ignore_origin() {
    for mode in MODES {
        assert_eq!(
            mode.apply(ModeTransition::CameraOpened),
            CaptureMode::CameraActive
        );
        assert_eq!(
            mode.apply(ModeTransition::ImageStaged),
            CaptureMode::PreviewHeld
        );
        assert_eq!(mode.apply(ModeTransition::Cleared), CaptureMode::Idle);
    }
}

#[test]
fn capture_mode_transition_tests_never_both_active() {
    for mode in MODES {
        for transition in TRANSITIONS {
            let next = mode.apply(transition);
            assert!(
                !(next.is_camera_active() && next.holds_preview()),
                "{mode:?} + {transition:?} produced {next:?}"
            );
        }
    }
}

#[test]
fn capture_mode_transition_tests_close_only_leaves_camera() {
    assert_eq!(
        CaptureMode::Idle.apply(ModeTransition::CameraClosed),
        CaptureMode::Idle
    );
    assert_eq!(
        CaptureMode::PreviewHeld.apply(ModeTransition::CameraClosed),
        CaptureMode::PreviewHeld
    );
    assert_eq!(
        CaptureMode::CameraActive.apply(ModeTransition::CameraClosed),
        CaptureMode::Idle
    );
}
