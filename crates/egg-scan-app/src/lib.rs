#![warn(missing_docs)]
//! # egg-scan-app
//!
//! ## Purpose
//! Orchestrates media capture, preview, submission and history for
//! `egg-scan`.
//!
//! ## Responsibilities
//! - Map each named UI action to exactly one handler.
//! - Keep the capture mode in step with the camera stream owner.
//! - Allow at most one prediction request in flight.
//! - Load supplied endpoint configuration.
//! - Project runtime state into a flat view for hosts to render.
//!
//! ## Data flow
//! [`UiAction`] -> [`ScannerApp::dispatch`] -> media controller / preview /
//! submission controller -> [`UiState`] -> [`ScannerView`].
//!
//! ## Ownership and lifetimes
//! A [`SubmissionTicket`] owns a copy of the image bytes, so camera and
//! preview actions taken while a request is in flight never affect it.
//!
//! ## Error model
//! Every handler converts failures into a status line before returning the
//! [`AppError`]; no error leaves the app in a non-interactable state.

use std::sync::Arc;
use std::time::Duration;

use egg_scan_capture::{
    CameraDevice, CameraToggle, CaptureError, FilePicker, MediaSourceController,
};
use egg_scan_contract::{HISTORY_PATH, PREDICT_PATH, PredictionResponse};
use egg_scan_core::{CaptureMode, PendingImage, PredictionRecord, SubmissionStatus};
use egg_scan_ui::{
    HistoryError, HistoryRow, NO_IMAGE_TEXT, NO_PREDICTION_TEXT, PROCESSING_TEXT, UiState,
    error_status, prediction_status,
};
use egg_scan_upload::{
    ImageUpload, ScanClient, ScanTransport, UploadError, classify_upload_error, validate_endpoint,
};
use log::{debug, info, warn};
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};
use url::Url;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("EGG_SCAN_VERSION");

/// Port of the legacy single-host deployment.
pub const DEFAULT_SERVICE_PORT: u16 = 5000;

/// Base URL used when no configuration is supplied.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Endpoint and display configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Prediction endpoint.
    pub predict_url: Url,
    /// History endpoint.
    pub history_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Whether the service host is local; selects camera permission wording.
    pub local_host: bool,
    /// Offset used to render history timestamps.
    pub display_offset: UtcOffset,
}

impl ScannerConfig {
    /// Legacy layout: plain HTTP on port 5000 of `host`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] when `host` does not form a URL.
    pub fn for_host(host: &str) -> Result<Self, ConfigError> {
        Self::from_base(&format!("http://{host}:{DEFAULT_SERVICE_PORT}/"))
    }

    /// Joins the endpoint paths onto `base`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] for unparsable bases or schemes
    /// other than `http`/`https`.
    pub fn from_base(base: &str) -> Result<Self, ConfigError> {
        let mut base = parse_endpoint(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let predict_url = base
            .join(PREDICT_PATH)
            .map_err(|error| ConfigError::InvalidUrl(error.to_string()))?;
        let history_url = base
            .join(HISTORY_PATH)
            .map_err(|error| ConfigError::InvalidUrl(error.to_string()))?;

        Ok(Self {
            local_host: is_local_host(&base),
            predict_url,
            history_url,
            timeout: egg_scan_upload::DEFAULT_TIMEOUT,
            display_offset: local_display_offset(),
        })
    }

    /// Reads configuration from the environment.
    ///
    /// - `EGG_SCAN_BASE_URL` (default [`DEFAULT_BASE_URL`])
    /// - `EGG_SCAN_PREDICT_URL` / `EGG_SCAN_HISTORY_URL` override one endpoint
    /// - `EGG_SCAN_TIMEOUT_SECS` (default 30)
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid URLs or timeouts.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = env_value("EGG_SCAN_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::from_base(&base)?;

        if let Some(predict) = env_value("EGG_SCAN_PREDICT_URL") {
            config.predict_url = parse_endpoint(&predict)?;
        }
        if let Some(history) = env_value("EGG_SCAN_HISTORY_URL") {
            config.history_url = parse_endpoint(&history)?;
        }
        config.local_host = is_local_host(&config.predict_url);

        if let Some(raw) = env_value("EGG_SCAN_TIMEOUT_SECS") {
            let seconds: u64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            if seconds == 0 {
                return Err(ConfigError::InvalidTimeout(raw));
            }
            config.timeout = Duration::from_secs(seconds);
        }

        Ok(config)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    validate_endpoint(raw).map_err(|error| ConfigError::InvalidUrl(error.to_string()))
}

fn is_local_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

fn local_display_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Named UI actions, one per control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Open/close camera toggle.
    ToggleCamera,
    /// Capture the current frame.
    Snap,
    /// Open the file picker.
    ChooseFile,
    /// Discard the still and reopen the camera.
    Retake,
    /// Discard everything and go idle.
    ScanAgain,
    /// Submit the staged image.
    Submit,
}

/// One packaged prediction request.
#[derive(Debug)]
pub struct SubmissionTicket {
    sequence: u64,
    upload: ImageUpload,
}

impl SubmissionTicket {
    /// Monotonic request number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Packaged image.
    pub fn upload(&self) -> &ImageUpload {
        &self.upload
    }
}

/// Guards the single in-flight prediction request.
#[derive(Debug, Default)]
pub struct SubmissionController {
    status: SubmissionStatus,
    issued: u64,
}

impl SubmissionController {
    /// Creates an idle controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    /// Number of requests issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Packages `pending` and marks the controller in flight.
    ///
    /// Returns `Ok(None)` while another request is in flight.
    ///
    /// # Errors
    /// Returns [`AppError::NoImageSelected`] when nothing is staged.
    pub fn begin(
        &mut self,
        pending: Option<&PendingImage>,
    ) -> Result<Option<SubmissionTicket>, AppError> {
        if self.status == SubmissionStatus::InFlight {
            debug!("submit ignored: request already in flight");
            return Ok(None);
        }
        let image = pending.ok_or(AppError::NoImageSelected)?;

        self.issued += 1;
        self.status = SubmissionStatus::InFlight;
        Ok(Some(SubmissionTicket {
            sequence: self.issued,
            upload: ImageUpload::from(image),
        }))
    }

    /// Returns the controller to idle.
    pub fn finish(&mut self, ticket: &SubmissionTicket) {
        debug!("request {} finished", ticket.sequence);
        self.status = SubmissionStatus::Idle;
    }
}

/// Flat projection of runtime state for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerView {
    /// Current capture mode.
    pub mode: CaptureMode,
    /// Status line text.
    pub status_text: String,
    /// Camera toggle label.
    pub camera_button_label: String,
    /// App version shown in the footer.
    pub version: String,
    /// Whether the submit trigger is enabled.
    pub submit_enabled: bool,
    /// Whether the live feed surface is visible.
    pub camera_visible: bool,
    /// Whether the still preview surface is visible.
    pub preview_visible: bool,
    /// History rows, top first.
    pub history: Vec<HistoryRow>,
}

/// Scanner orchestrator.
pub struct ScannerApp {
    media: MediaSourceController,
    client: ScanClient,
    submissions: SubmissionController,
    ui: UiState,
    clock: fn() -> OffsetDateTime,
}

impl ScannerApp {
    /// Wires collaborators from configuration.
    ///
    /// # Errors
    /// Returns [`AppError::Upload`] when the configured endpoints are
    /// rejected by the client.
    pub fn new(
        config: &ScannerConfig,
        camera: Arc<dyn CameraDevice>,
        picker: Box<dyn FilePicker>,
        transport: Arc<dyn ScanTransport>,
    ) -> Result<Self, AppError> {
        let client = ScanClient::new(
            config.predict_url.as_str(),
            config.history_url.as_str(),
            transport,
        )?;
        let media = MediaSourceController::new(camera, picker).with_local_host(config.local_host);

        Ok(Self {
            media,
            client,
            submissions: SubmissionController::new(),
            ui: UiState::new(APP_VERSION, config.display_offset),
            clock: OffsetDateTime::now_utc,
        })
    }

    /// Replaces the clock used to stamp new records.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// UI state snapshot.
    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Media source controller.
    pub fn media(&self) -> &MediaSourceController {
        &self.media
    }

    /// Prediction client, cloneable for hosts that run requests elsewhere.
    pub fn client(&self) -> &ScanClient {
        &self.client
    }

    /// Submission status.
    pub fn submission_status(&self) -> SubmissionStatus {
        self.submissions.status()
    }

    /// Number of prediction requests issued.
    pub fn requests_issued(&self) -> u64 {
        self.submissions.issued()
    }

    /// Dispatches one UI action to its handler.
    ///
    /// # Errors
    /// Returns the handler's error after it has been surfaced in the status
    /// line.
    pub fn dispatch(&mut self, action: UiAction) -> Result<(), AppError> {
        debug!("dispatch {action:?}");
        match action {
            UiAction::ToggleCamera => self.toggle_camera().map(|_| ()),
            UiAction::Snap => self.capture_photo(),
            UiAction::ChooseFile => self.choose_file().map(|_| ()),
            UiAction::Retake => self.retake(),
            UiAction::ScanAgain => {
                self.clear();
                Ok(())
            }
            UiAction::Submit => self.submit().map(|_| ()),
        }
    }

    /// Loads the startup history batch once.
    ///
    /// A failed fetch leaves the log empty and marks it loaded.
    ///
    /// # Errors
    /// Returns [`AppError::Upload`] for fetch failures and
    /// [`AppError::History`] on a second call.
    pub fn load_history(&mut self) -> Result<usize, AppError> {
        if self.ui.history.is_loaded() {
            return Err(AppError::History(HistoryError::AlreadyLoaded));
        }

        match self.client.fetch_history() {
            Ok(records) => Ok(self.ui.history.load_initial(records)?),
            Err(error) => {
                warn!("history load failed: {error}");
                self.ui.history.mark_load_failed();
                Err(AppError::Upload(error))
            }
        }
    }

    /// Camera toggle: opens the camera, or closes it when active.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] when access is refused.
    pub fn toggle_camera(&mut self) -> Result<CameraToggle, AppError> {
        match self.media.open_camera() {
            Ok(CameraToggle::Opened) => {
                self.ui.preview.camera_opened();
                Ok(CameraToggle::Opened)
            }
            Ok(CameraToggle::Closed) => {
                self.ui.preview.camera_closed();
                Ok(CameraToggle::Closed)
            }
            Err(error) => Err(self.capture_failed(error)),
        }
    }

    /// Captures a still and stages it.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] without a live feed or on frame failure.
    pub fn capture_photo(&mut self) -> Result<(), AppError> {
        match self.media.capture_photo() {
            Ok(image) => {
                self.stage(image);
                Ok(())
            }
            Err(error) => Err(self.capture_failed(error)),
        }
    }

    /// Opens the picker and stages the selection. Returns `false` when the
    /// pick was cancelled.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] for picker failures or empty files.
    pub fn choose_file(&mut self) -> Result<bool, AppError> {
        match self.media.choose_file() {
            Ok(Some(image)) => {
                self.stage(image);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(error) => Err(self.capture_failed(error)),
        }
    }

    /// Drops the staged image, resets status and picker, closes the camera.
    pub fn clear(&mut self) {
        self.media.close_camera();
        self.media.reset_selection();
        self.ui.preview.clear();
        self.ui.set_status(NO_PREDICTION_TEXT);
    }

    /// Clears, then reopens the camera.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] when the camera cannot be reopened.
    pub fn retake(&mut self) -> Result<(), AppError> {
        self.clear();
        self.toggle_camera().map(|_| ())
    }

    /// Starts a submission without performing the request.
    ///
    /// Returns `Ok(None)` while another request is in flight. On success the
    /// status shows the processing indicator and the trigger is disabled
    /// until [`ScannerApp::finish_submit`].
    ///
    /// # Errors
    /// Returns [`AppError::NoImageSelected`] when nothing is staged.
    pub fn begin_submit(&mut self) -> Result<Option<SubmissionTicket>, AppError> {
        match self.submissions.begin(self.ui.preview.pending()) {
            Ok(Some(ticket)) => {
                self.ui.set_status(PROCESSING_TEXT);
                Ok(Some(ticket))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                self.ui.set_status(NO_IMAGE_TEXT);
                Err(error)
            }
        }
    }

    /// Applies the outcome of a request started by
    /// [`ScannerApp::begin_submit`] and re-enables the trigger.
    ///
    /// # Errors
    /// Returns [`AppError::Upload`] for failed requests after surfacing
    /// `Error: {message}`.
    pub fn finish_submit(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<PredictionResponse, UploadError>,
    ) -> Result<PredictionRecord, AppError> {
        self.submissions.finish(&ticket);

        match outcome {
            Ok(response) => {
                let record = response.into_record((self.clock)());
                if record.confidence.is_out_of_range() {
                    warn!("confidence {} outside 0..=100", record.confidence);
                }
                info!(
                    "prediction {} -> {} ({}%)",
                    ticket.upload.file_name, record.result, record.confidence
                );
                self.ui
                    .set_status(prediction_status(&record.result, &record.confidence));
                self.ui.history.prepend(record.clone());
                Ok(record)
            }
            Err(error) => {
                let class = classify_upload_error(&error);
                warn!("prediction request failed ({class:?}): {error}");
                self.ui.set_status(error_status(&error.user_message()));
                Err(AppError::Upload(error))
            }
        }
    }

    /// Opens the picker and submits the selection.
    ///
    /// Returns `Ok(None)` when the pick was cancelled or a request is already
    /// in flight.
    ///
    /// # Errors
    /// Returns picker errors without submitting, so a failed pick never sends
    /// the image staged before it. Otherwise as [`ScannerApp::submit`].
    pub fn choose_and_submit(&mut self) -> Result<Option<PredictionRecord>, AppError> {
        if !self.choose_file()? {
            return Ok(None);
        }
        self.submit()
    }

    /// Submits the staged image and waits for the result.
    ///
    /// Returns `Ok(None)` when a request is already in flight.
    ///
    /// # Errors
    /// Returns [`AppError::NoImageSelected`] or [`AppError::Upload`].
    pub fn submit(&mut self) -> Result<Option<PredictionRecord>, AppError> {
        let Some(ticket) = self.begin_submit()? else {
            return Ok(None);
        };
        let outcome = self.client.predict(ticket.upload());
        self.finish_submit(ticket, outcome).map(Some)
    }

    /// Projects runtime state into a flat view.
    pub fn view(&self) -> ScannerView {
        let mode = self.ui.preview.mode();
        ScannerView {
            mode,
            status_text: self.ui.status_text.clone(),
            version: self.ui.version.clone(),
            camera_button_label: self.ui.camera_button_label().to_string(),
            submit_enabled: self.submissions.status() == SubmissionStatus::Idle,
            camera_visible: mode.is_camera_active(),
            preview_visible: !mode.is_camera_active(),
            history: self.ui.history.rows(),
        }
    }

    fn stage(&mut self, image: PendingImage) {
        self.media.close_camera();
        self.ui.preview.camera_closed();
        self.ui.preview.set_pending(image);
    }

    fn capture_failed(&mut self, error: CaptureError) -> AppError {
        // Keep the mode in step with the stream owner after partial failures.
        if !self.media.is_camera_active() {
            self.ui.preview.camera_closed();
        }
        self.ui
            .set_status(error.status_message(self.media.local_host()));
        AppError::Capture(error)
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Endpoint URL is unusable.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    /// Timeout is not a positive number of seconds.
    #[error("invalid timeout seconds: {0}")]
    InvalidTimeout(String),
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Submission triggered with nothing staged.
    #[error("no image selected")]
    NoImageSelected,
    /// Camera or file picker error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Prediction or history request error.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
    /// History log error.
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
