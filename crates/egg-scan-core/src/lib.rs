#![warn(missing_docs)]
//! # egg-scan-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `egg-scan` workspace.
//!
//! ## Responsibilities
//! - Represent the capture mode state machine and its single transition
//!   function.
//! - Represent the staged image that is submitted for classification.
//! - Represent prediction records as received from the service or created
//!   locally after a successful submission.
//!
//! ## Data flow
//! Capture code produces a [`PendingImage`] -> preview state stages it and
//! moves [`CaptureMode`] to `PreviewHeld` -> submission yields one
//! [`PredictionRecord`] for the history log.
//!
//! ## Ownership and lifetimes
//! Images and records own their buffers (`Vec<u8>`, `String`) so an in-flight
//! submission never borrows from preview state.
//!
//! ## Error model
//! Construction failures (empty image bytes, blank file names) return
//! [`CoreError`] variants.
//!
//! ## Example
//! ```rust
//! use egg_scan_core::{CaptureMode, ModeTransition};
//!
//! let mode = CaptureMode::Idle.apply(ModeTransition::CameraOpened);
//! assert_eq!(mode, CaptureMode::CameraActive);
//! assert_eq!(mode.apply(ModeTransition::ImageStaged), CaptureMode::PreviewHeld);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::{Iso8601, Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// File name attached to stills captured from the camera.
pub const CAPTURED_FILE_NAME: &str = "captured.jpg";

/// Mutually exclusive visual mode of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Neither a live feed nor a staged image is shown.
    #[default]
    Idle,
    /// The live camera feed is shown.
    CameraActive,
    /// A captured or selected still is staged for submission.
    PreviewHeld,
}

/// Events that move [`CaptureMode`] between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    /// A camera stream was acquired.
    CameraOpened,
    /// The camera stream was released.
    CameraClosed,
    /// A new image was staged.
    ImageStaged,
    /// Staged image and camera were both dropped.
    Cleared,
}

impl CaptureMode {
    /// Returns the mode reached after `transition`.
    ///
    /// Entering `CameraActive` exits `PreviewHeld` and vice versa; closing the
    /// camera only leaves `CameraActive`.
    pub fn apply(self, transition: ModeTransition) -> CaptureMode {
        match transition {
            ModeTransition::CameraOpened => CaptureMode::CameraActive,
            ModeTransition::ImageStaged => CaptureMode::PreviewHeld,
            ModeTransition::Cleared => CaptureMode::Idle,
            ModeTransition::CameraClosed => match self {
                CaptureMode::CameraActive => CaptureMode::Idle,
                other => other,
            },
        }
    }

    /// Returns `true` while the live feed is shown.
    pub fn is_camera_active(self) -> bool {
        self == CaptureMode::CameraActive
    }

    /// Returns `true` while a still is staged.
    pub fn holds_preview(self) -> bool {
        self == CaptureMode::PreviewHeld
    }
}

/// Media type tag carried with image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    /// `image/jpeg`.
    Jpeg,
    /// `image/png`.
    Png,
    /// `image/bmp`.
    Bmp,
    /// Any other MIME type, kept verbatim.
    Other(String),
}

impl MediaType {
    /// Returns the MIME string used for the multipart part.
    pub fn mime(&self) -> &str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Bmp => "image/bmp",
            MediaType::Other(mime) => mime,
        }
    }

    /// Infers a media type from a file name extension.
    pub fn from_file_name(file_name: &str) -> Option<MediaType> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "bmp" => Some(MediaType::Bmp),
            _ => None,
        }
    }
}

/// Where a staged image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Still captured from the live camera feed.
    Camera,
    /// File chosen through the platform picker.
    FilePicker,
}

/// The single image staged for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    bytes: Vec<u8>,
    media_type: MediaType,
    file_name: String,
    source: ImageSource,
}

impl PendingImage {
    /// Constructs a validated pending image.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyImage`] when `bytes` is empty and
    /// [`CoreError::InvalidFileName`] when `file_name` is blank.
    pub fn new(
        bytes: Vec<u8>,
        media_type: MediaType,
        file_name: impl Into<String>,
        source: ImageSource,
    ) -> Result<Self, CoreError> {
        if bytes.is_empty() {
            return Err(CoreError::EmptyImage);
        }

        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(CoreError::InvalidFileName);
        }

        Ok(Self {
            bytes,
            media_type,
            file_name,
            source,
        })
    }

    /// Constructs a camera still with the canonical captured file name.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyImage`] when `jpeg` is empty.
    pub fn captured_jpeg(jpeg: Vec<u8>) -> Result<Self, CoreError> {
        Self::new(
            jpeg,
            MediaType::Jpeg,
            CAPTURED_FILE_NAME,
            ImageSource::Camera,
        )
    }

    /// Encoded image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Media type tag.
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// File name sent with the upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Origin of the image.
    pub fn source(&self) -> ImageSource {
        self.source
    }
}

/// Whether a prediction request is currently awaiting a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// No request outstanding; the trigger is enabled.
    #[default]
    Idle,
    /// Exactly one request is outstanding; the trigger is disabled.
    InFlight,
}

/// Timestamp of a prediction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordTimestamp {
    /// Parsed instant.
    Instant(OffsetDateTime),
    /// Text that could not be parsed, rendered as received.
    Raw(String),
}

impl RecordTimestamp {
    /// Parses RFC 3339, ISO 8601 (offset optional, UTC assumed) or RFC 2822
    /// text, falling back to [`RecordTimestamp::Raw`].
    pub fn parse(raw: &str) -> RecordTimestamp {
        let trimmed = raw.trim();
        if let Ok(instant) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return RecordTimestamp::Instant(instant);
        }
        if let Ok(instant) = OffsetDateTime::parse(trimmed, &Iso8601::DEFAULT) {
            return RecordTimestamp::Instant(instant);
        }
        if let Ok(naive) = PrimitiveDateTime::parse(trimmed, &Iso8601::DEFAULT) {
            return RecordTimestamp::Instant(naive.assume_utc());
        }
        if let Ok(instant) = OffsetDateTime::parse(trimmed, &Rfc2822) {
            return RecordTimestamp::Instant(instant);
        }
        RecordTimestamp::Raw(raw.to_string())
    }

    /// Renders the timestamp as a display string at `offset`.
    pub fn display_at(&self, offset: UtcOffset) -> String {
        match self {
            RecordTimestamp::Instant(instant) => instant
                .to_offset(offset)
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .unwrap_or_else(|_| instant.to_string()),
            RecordTimestamp::Raw(raw) => raw.clone(),
        }
    }
}

/// Confidence attached to a prediction, as a percentage.
#[derive(Debug, Clone, PartialEq)]
pub enum Confidence {
    /// Numeric percentage (nominally 0 to 100).
    Percent(f64),
    /// Non-numeric value, rendered as received.
    Raw(String),
}

impl Confidence {
    /// Builds a confidence from an arbitrary JSON value.
    ///
    /// Numbers become [`Confidence::Percent`]; strings are kept verbatim and
    /// any other value keeps its JSON text.
    pub fn from_json(value: &serde_json::Value) -> Confidence {
        match value {
            serde_json::Value::Number(number) => number
                .as_f64()
                .map(Confidence::Percent)
                .unwrap_or_else(|| Confidence::Raw(number.to_string())),
            serde_json::Value::String(text) => Confidence::Raw(text.clone()),
            other => Confidence::Raw(other.to_string()),
        }
    }

    /// Returns `true` for numeric values outside `0..=100`.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Confidence::Percent(value) if !(0.0..=100.0).contains(value))
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Percent(value) => write!(f, "{value}"),
            Confidence::Raw(raw) => f.write_str(raw),
        }
    }
}

/// One historical or freshly produced classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// When the prediction was made.
    pub timestamp: RecordTimestamp,
    /// Class label returned by the classifier.
    pub result: String,
    /// Confidence of the winning label.
    pub confidence: Confidence,
    /// Per-class percentages, when the service reports them.
    pub probs: BTreeMap<String, f64>,
    /// Location of the stored upload, when the service reports one.
    pub image_url: Option<String>,
    /// Stored file name, when the service reports one.
    pub filename: Option<String>,
}

impl PredictionRecord {
    /// Creates a record with only the three displayed fields populated.
    pub fn new(
        timestamp: RecordTimestamp,
        result: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            timestamp,
            result: result.into(),
            confidence,
            probs: BTreeMap::new(),
            image_url: None,
            filename: None,
        }
    }
}

/// Error type for core construction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Image buffers must contain at least one byte.
    #[error("image bytes are empty")]
    EmptyImage,
    /// File names attached to uploads cannot be blank.
    #[error("image file name is empty")]
    InvalidFileName,
}
