#![warn(missing_docs)]
//! # egg-scan-ui
//!
//! ## Purpose
//! Defines the UI-facing state of the scanner: the preview slot, the history
//! log and the status line.
//!
//! ## Responsibilities
//! - Hold zero or one [`PendingImage`] and keep [`CaptureMode`] consistent
//!   with it.
//! - Keep the insertion-ordered history log and render its rows.
//! - Produce the status line texts.
//!
//! ## Data flow
//! App orchestration events mutate [`UiState`]; a host renders it.
//!
//! ## Ownership and lifetimes
//! `UiState` owns every value it renders, so event handlers never hold
//! borrows across a network call.
//!
//! ## Error model
//! Only the history log can refuse an operation ([`HistoryError`]); all
//! other invalid combinations are prevented by the transition function.

use egg_scan_core::{CaptureMode, ModeTransition, PendingImage, PredictionRecord};
use log::debug;
use thiserror::Error;
use time::UtcOffset;

/// Status line before any prediction.
pub const NO_PREDICTION_TEXT: &str = "No prediction yet";

/// Status line while a request is in flight.
pub const PROCESSING_TEXT: &str = "Processing…";

/// Status line when submit is triggered without an image.
pub const NO_IMAGE_TEXT: &str = "No image chosen";

/// Camera toggle label while the camera is closed.
pub const OPEN_CAMERA_LABEL: &str = "Open Camera";

/// Camera toggle label while the camera is open.
pub const CLOSE_CAMERA_LABEL: &str = "Close Camera";

/// Status line for a successful prediction.
pub fn prediction_status(result: &str, confidence: impl std::fmt::Display) -> String {
    format!("{result} — {confidence}%")
}

/// Status line for a failure.
pub fn error_status(message: &str) -> String {
    format!("Error: {message}")
}

/// Single-slot preview holder, mutually exclusive with the live camera.
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    mode: CaptureMode,
    pending: Option<PendingImage>,
}

impl PreviewState {
    /// Creates an idle preview.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current capture mode.
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Staged image, present only in `PreviewHeld`.
    pub fn pending(&self) -> Option<&PendingImage> {
        self.pending.as_ref()
    }

    /// Replaces any staged image and enters `PreviewHeld`.
    pub fn set_pending(&mut self, image: PendingImage) {
        self.pending = Some(image);
        self.apply(ModeTransition::ImageStaged);
    }

    /// Drops the staged image and returns to `Idle`.
    pub fn clear(&mut self) {
        self.pending = None;
        self.apply(ModeTransition::Cleared);
    }

    /// Records that a camera stream was acquired; drops any staged image.
    pub fn camera_opened(&mut self) {
        self.pending = None;
        self.apply(ModeTransition::CameraOpened);
    }

    /// Records that the camera stream was released.
    pub fn camera_closed(&mut self) {
        self.apply(ModeTransition::CameraClosed);
    }

    fn apply(&mut self, transition: ModeTransition) {
        let from = self.mode;
        let to = from.apply(transition);
        if to != from {
            debug!("capture mode {from:?} -> {to:?} ({transition:?})");
        }
        self.mode = to;
    }
}

/// One rendered history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    /// Display timestamp.
    pub timestamp: String,
    /// Result label.
    pub result: String,
    /// Confidence followed by `%`.
    pub confidence: String,
}

/// Insertion-ordered prediction history, top row first.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    records: Vec<PredictionRecord>,
    loaded: bool,
    display_offset: UtcOffset,
}

impl HistoryLog {
    /// Creates an empty log rendering timestamps at `display_offset`.
    pub fn new(display_offset: UtcOffset) -> Self {
        Self {
            records: Vec::new(),
            loaded: false,
            display_offset,
        }
    }

    /// Appends the startup batch below any rows already shown, in the order
    /// received.
    ///
    /// # Errors
    /// Returns [`HistoryError::AlreadyLoaded`] on a second call.
    pub fn load_initial(&mut self, records: Vec<PredictionRecord>) -> Result<usize, HistoryError> {
        if self.loaded {
            return Err(HistoryError::AlreadyLoaded);
        }
        self.loaded = true;
        let count = records.len();
        self.records.extend(records);
        Ok(count)
    }

    /// Marks the startup load as done without rows, after a failed fetch.
    pub fn mark_load_failed(&mut self) {
        self.loaded = true;
    }

    /// Returns `true` once the startup load has completed or failed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Inserts one record at the top.
    pub fn prepend(&mut self, record: PredictionRecord) {
        self.records.insert(0, record);
    }

    /// Records in display order.
    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no rows are shown.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders every row in display order.
    pub fn rows(&self) -> Vec<HistoryRow> {
        self.records
            .iter()
            .map(|record| HistoryRow {
                timestamp: record.timestamp.display_at(self.display_offset),
                result: record.result.clone(),
                confidence: format!("{}%", record.confidence),
            })
            .collect()
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

/// Aggregate UI runtime state.
#[derive(Debug, Clone)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Preview slot and capture mode.
    pub preview: PreviewState,
    /// History rows.
    pub history: HistoryLog,
    /// Human-readable status line.
    pub status_text: String,
}

impl UiState {
    /// Creates default UI state.
    pub fn new(version: impl Into<String>, display_offset: UtcOffset) -> Self {
        Self {
            version: version.into(),
            preview: PreviewState::new(),
            history: HistoryLog::new(display_offset),
            status_text: NO_PREDICTION_TEXT.to_string(),
        }
    }

    /// Replaces the status line.
    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status_text = text.into();
    }

    /// Label of the camera toggle.
    pub fn camera_button_label(&self) -> &'static str {
        if self.preview.mode().is_camera_active() {
            CLOSE_CAMERA_LABEL
        } else {
            OPEN_CAMERA_LABEL
        }
    }
}

/// History log errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// The startup batch can only be loaded once.
    #[error("history was already loaded")]
    AlreadyLoaded,
}

#[cfg(test)]
mod tests {
    //! Unit tests for preview exclusivity and history ordering.

    use egg_scan_core::{Confidence, RecordTimestamp};

    use super::*;

    fn record(label: &str) -> PredictionRecord {
        PredictionRecord::new(
            RecordTimestamp::parse("2026-10-14T08:00:00Z"),
            label,
            Confidence::Percent(50.0),
        )
    }

    #[test]
    fn opening_camera_drops_pending_image() {
        let mut preview = PreviewState::new();
        preview.set_pending(PendingImage::captured_jpeg(vec![1, 2, 3]).unwrap());
        assert_eq!(preview.mode(), CaptureMode::PreviewHeld);

        preview.camera_opened();
        assert_eq!(preview.mode(), CaptureMode::CameraActive);
        assert!(preview.pending().is_none());
    }

    #[test]
    fn history_prepends_above_initial_batch() {
        let mut log = HistoryLog::default();
        log.load_initial(vec![record("Fresh"), record("Spoiled")])
            .unwrap();
        log.prepend(record("Invalid"));

        let labels: Vec<_> = log.rows().into_iter().map(|row| row.result).collect();
        assert_eq!(labels, vec!["Invalid", "Fresh", "Spoiled"]);
        assert_eq!(
            log.load_initial(Vec::new()),
            Err(HistoryError::AlreadyLoaded)
        );
    }

    #[test]
    fn row_renders_percent_suffix() {
        let mut log = HistoryLog::default();
        log.prepend(record("Fresh"));
        let row = &log.rows()[0];
        assert_eq!(row.confidence, "50%");
        assert_eq!(row.timestamp, "2026-10-14 08:00:00");
    }

    #[test]
    fn camera_label_follows_mode() {
        let mut state = UiState::new("0.1.0", UtcOffset::UTC);
        assert_eq!(state.camera_button_label(), OPEN_CAMERA_LABEL);
        state.preview.camera_opened();
        assert_eq!(state.camera_button_label(), CLOSE_CAMERA_LABEL);
    }
}
