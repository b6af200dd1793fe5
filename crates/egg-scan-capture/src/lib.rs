#![warn(missing_docs)]
//! # egg-scan-capture
//!
//! ## Purpose
//! Provides the media source controller: one camera stream lifecycle and one
//! file picker lifecycle, each producing a [`PendingImage`].
//!
//! ## Responsibilities
//! - Define backend-agnostic camera and file picker traits.
//! - Own the single camera stream handle with paired acquire/release.
//! - Encode camera frames into JPEG stills.
//! - Expose deterministic synthetic backends for CI and unit tests, and a
//!   path-backed picker for headless runs.
//!
//! ## Data flow
//! UI toggle -> [`MediaSourceController::open_camera`] acquires a
//! [`CameraStream`] -> [`MediaSourceController::capture_photo`] grabs an
//! [`RgbaFrame`], encodes JPEG, releases the stream -> [`PendingImage`] goes to
//! preview state.
//!
//! ## Ownership and lifetimes
//! The stream handle lives in an `Option<Box<dyn CameraStream>>` field; taking
//! it out of the option is the only way to release it, so a stream can never
//! be released twice.
//!
//! ## Error model
//! Permission, environment, playback, encoding and picker failures are
//! reported as [`CaptureError`] values with a matching status message.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use egg_scan_core::{CoreError, ImageSource, MediaType, PendingImage};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, info, warn};
use thiserror::Error;

/// Default JPEG quality for camera stills.
pub const JPEG_QUALITY: u8 = 92;

/// One RGBA frame read from a live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl RgbaFrame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidFrameShape`] when the buffer length does
    /// not match the declared geometry or the geometry is empty.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .unwrap_or(usize::MAX);
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(CaptureError::InvalidFrameShape {
                expected,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            width,
            height,
            rgba,
        })
    }
}

/// Live stream handle returned by a [`CameraDevice`].
pub trait CameraStream: Send {
    /// Starts rendering the live feed.
    ///
    /// # Errors
    /// Returns [`CaptureError::PlaybackFailed`] when the feed cannot play.
    fn start_playback(&mut self) -> Result<(), CaptureError>;

    /// Reads the current video frame.
    fn grab_frame(&mut self) -> Result<RgbaFrame, CaptureError>;

    /// Stops every hardware track backing this stream.
    fn stop(&mut self);
}

/// Camera access provider.
pub trait CameraDevice: Send + Sync {
    /// Requests camera access.
    ///
    /// # Errors
    /// Returns [`CaptureError::PermissionDenied`] or
    /// [`CaptureError::UnsupportedEnvironment`] when access cannot be granted.
    fn acquire(&self) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// One file returned by a [`FilePicker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    /// File name as reported by the platform.
    pub name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Platform file picker.
pub trait FilePicker: Send {
    /// Drops any prior selection so the same file can be picked again.
    fn reset(&mut self);

    /// Opens the picker; `Ok(None)` means the user cancelled.
    fn pick(&mut self) -> Result<Option<PickedFile>, CaptureError>;
}

/// Result of the camera toggle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraToggle {
    /// A new stream was acquired and is playing.
    Opened,
    /// The active stream was released.
    Closed,
}

/// Acquisition/release counters for the owned stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// Number of successful acquisitions.
    pub acquisitions: u64,
    /// Number of releases.
    pub releases: u64,
}

/// Owns the camera stream handle and the file picker.
pub struct MediaSourceController {
    device: Arc<dyn CameraDevice>,
    picker: Box<dyn FilePicker>,
    stream: Option<Box<dyn CameraStream>>,
    local_host: bool,
    stats: StreamStats,
}

impl MediaSourceController {
    /// Creates a controller with no active stream.
    pub fn new(device: Arc<dyn CameraDevice>, picker: Box<dyn FilePicker>) -> Self {
        Self {
            device,
            picker,
            stream: None,
            local_host: true,
            stats: StreamStats::default(),
        }
    }

    /// Records whether the app is served from a local host, which selects
    /// the permission-denied status wording.
    pub fn with_local_host(mut self, local_host: bool) -> Self {
        self.local_host = local_host;
        self
    }

    /// Returns `true` while a stream is held.
    pub fn is_camera_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns acquisition/release counters.
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Returns `true` when the host is treated as local.
    pub fn local_host(&self) -> bool {
        self.local_host
    }

    /// Toggles the camera: closes an active stream, otherwise acquires one.
    ///
    /// # Errors
    /// Propagates acquisition failures and [`CaptureError::PlaybackFailed`].
    /// No stream is held after an error.
    pub fn open_camera(&mut self) -> Result<CameraToggle, CaptureError> {
        if self.close_camera() {
            return Ok(CameraToggle::Closed);
        }

        let mut stream = self.device.acquire().inspect_err(|error| {
            warn!("camera acquisition failed: {error}");
        })?;
        self.stats.acquisitions += 1;

        if let Err(error) = stream.start_playback() {
            warn!("camera playback failed: {error}");
            stream.stop();
            self.stats.releases += 1;
            return Err(error);
        }

        self.stream = Some(stream);
        info!("camera stream acquired");
        Ok(CameraToggle::Opened)
    }

    /// Releases the active stream, if any. Returns `true` when a stream was
    /// released.
    pub fn close_camera(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                self.stats.releases += 1;
                info!("camera stream released");
                true
            }
            None => false,
        }
    }

    /// Captures the current frame as a JPEG still and releases the camera.
    ///
    /// # Errors
    /// Returns [`CaptureError::NoActiveStream`] when no stream is held, or the
    /// frame/encoding error. The stream stays open when the frame grab fails.
    pub fn capture_photo(&mut self) -> Result<PendingImage, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::NoActiveStream)?;
        let frame = stream.grab_frame()?;
        let jpeg = encode_jpeg(&frame, JPEG_QUALITY)?;
        let image = PendingImage::captured_jpeg(jpeg)?;
        debug!(
            "captured {}x{} still ({} bytes)",
            frame.width,
            frame.height,
            image.bytes().len()
        );

        self.close_camera();
        Ok(image)
    }

    /// Resets the picker, opens it, and converts the selection.
    ///
    /// A cancelled pick returns `Ok(None)` and leaves the camera untouched;
    /// a selection closes the camera.
    ///
    /// # Errors
    /// Returns picker failures and [`CaptureError::Core`] for empty files.
    pub fn choose_file(&mut self) -> Result<Option<PendingImage>, CaptureError> {
        self.picker.reset();
        let Some(picked) = self.picker.pick()? else {
            debug!("file selection cancelled");
            return Ok(None);
        };

        let media_type = media_type_for(&picked);
        let image = PendingImage::new(
            picked.bytes,
            media_type,
            picked.name,
            ImageSource::FilePicker,
        )?;
        debug!(
            "selected file {} ({})",
            image.file_name(),
            image.media_type().mime()
        );

        self.close_camera();
        Ok(Some(image))
    }

    /// Clears the picker selection state.
    pub fn reset_selection(&mut self) {
        self.picker.reset();
    }
}

impl Drop for MediaSourceController {
    fn drop(&mut self) {
        self.close_camera();
    }
}

/// Encodes an RGBA frame as JPEG, discarding alpha.
///
/// # Errors
/// Returns [`CaptureError::Encode`] when the encoder rejects the frame.
pub fn encode_jpeg(frame: &RgbaFrame, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or(
        CaptureError::InvalidFrameShape {
            expected: (frame.width as usize) * (frame.height as usize) * 4,
            actual: frame.rgba.len(),
        },
    )?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(|error| CaptureError::Encode(error.to_string()))?;
    Ok(jpeg)
}

fn media_type_for(picked: &PickedFile) -> MediaType {
    if let Some(media_type) = MediaType::from_file_name(&picked.name) {
        return media_type;
    }

    match image::guess_format(&picked.bytes) {
        Ok(ImageFormat::Jpeg) => MediaType::Jpeg,
        Ok(ImageFormat::Png) => MediaType::Png,
        Ok(ImageFormat::Bmp) => MediaType::Bmp,
        Ok(format) => MediaType::Other(format.to_mime_type().to_string()),
        Err(_) => MediaType::Other("application/octet-stream".to_string()),
    }
}

/// Camera device for environments without camera access.
#[derive(Debug, Clone, Default)]
pub struct UnsupportedCamera;

impl CameraDevice for UnsupportedCamera {
    fn acquire(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
        Err(CaptureError::UnsupportedEnvironment(
            "no camera backend is available on this platform".to_string(),
        ))
    }
}

/// How a [`SyntheticCamera`] answers acquisition requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticBehavior {
    /// Grants access and plays.
    Grant,
    /// Denies permission.
    Deny,
    /// Reports an unsupported environment.
    Unsupported,
    /// Grants access but fails to play.
    FailPlayback,
}

/// Deterministic camera for test and CI usage.
///
/// Counters are shared with every stream it hands out, so tests can assert
/// that each acquisition is matched by exactly one release.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    behavior: SyntheticBehavior,
    acquired: Arc<AtomicU64>,
    stopped: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
}

impl SyntheticCamera {
    /// Creates a granting 4x4 camera.
    pub fn new() -> Self {
        Self::with_behavior(SyntheticBehavior::Grant)
    }

    /// Creates a 4x4 camera with the given behavior.
    pub fn with_behavior(behavior: SyntheticBehavior) -> Self {
        Self {
            width: 4,
            height: 4,
            behavior,
            acquired: Arc::new(AtomicU64::new(0)),
            stopped: Arc::new(AtomicU64::new(0)),
            live: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of streams handed out.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Number of streams stopped.
    pub fn stopped(&self) -> u64 {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns `true` while a handed-out stream has not been stopped.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for SyntheticCamera {
    fn acquire(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
        match self.behavior {
            SyntheticBehavior::Deny => {
                return Err(CaptureError::PermissionDenied(
                    "synthetic camera denied access".to_string(),
                ));
            }
            SyntheticBehavior::Unsupported => {
                return Err(CaptureError::UnsupportedEnvironment(
                    "synthetic camera is unsupported".to_string(),
                ));
            }
            SyntheticBehavior::Grant | SyntheticBehavior::FailPlayback => {}
        }

        // A second live acquisition means a stream leaked.
        if self.live.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Backend(
                "synthetic camera is already streaming".to_string(),
            ));
        }
        let sequence = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(Box::new(SyntheticStream {
            width: self.width,
            height: self.height,
            sequence,
            fail_playback: self.behavior == SyntheticBehavior::FailPlayback,
            stopped: Arc::clone(&self.stopped),
            live: Arc::clone(&self.live),
            active: true,
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    sequence: u64,
    fail_playback: bool,
    stopped: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
    active: bool,
}

impl CameraStream for SyntheticStream {
    fn start_playback(&mut self) -> Result<(), CaptureError> {
        if self.fail_playback {
            return Err(CaptureError::PlaybackFailed(
                "synthetic playback failure".to_string(),
            ));
        }
        Ok(())
    }

    fn grab_frame(&mut self) -> Result<RgbaFrame, CaptureError> {
        if !self.active {
            return Err(CaptureError::NoActiveStream);
        }
        let byte = (self.sequence % 255) as u8;
        let len = (self.width as usize) * (self.height as usize) * 4;
        RgbaFrame::new(self.width, self.height, vec![byte; len])
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.stopped.fetch_add(1, Ordering::SeqCst);
            self.live.store(false, Ordering::SeqCst);
        }
    }
}

/// File picker that hands out queued files in order.
///
/// Once the queue is empty every pick is treated as a cancelled dialog.
#[derive(Debug, Clone, Default)]
pub struct QueuedFilePicker {
    queue: VecDeque<PickedFile>,
    resets: u64,
}

impl QueuedFilePicker {
    /// Creates a picker that will return `files` in order.
    pub fn new(files: impl IntoIterator<Item = PickedFile>) -> Self {
        Self {
            queue: files.into_iter().collect(),
            resets: 0,
        }
    }

    /// Appends one file to the queue.
    pub fn push(&mut self, file: PickedFile) {
        self.queue.push_back(file);
    }

    /// Number of times the selection was reset.
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

impl FilePicker for QueuedFilePicker {
    fn reset(&mut self) {
        self.resets += 1;
    }

    fn pick(&mut self) -> Result<Option<PickedFile>, CaptureError> {
        Ok(self.queue.pop_front())
    }
}

/// File picker over a fixed list of paths, each read when it is picked.
///
/// Once the list is exhausted every pick is treated as a cancelled dialog.
#[derive(Debug, Clone, Default)]
pub struct PathFilePicker {
    paths: VecDeque<PathBuf>,
}

impl PathFilePicker {
    /// Creates a picker that will read `paths` in order.
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of paths not yet picked.
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FilePicker for PathFilePicker {
    fn reset(&mut self) {}

    fn pick(&mut self) -> Result<Option<PickedFile>, CaptureError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let bytes = fs::read(&path).map_err(|error| {
            CaptureError::Picker(format!("cannot read {}: {error}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Some(PickedFile { name, bytes }))
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// User or platform denied camera access.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// Camera access is impossible in this environment (for example an
    /// insecure context).
    #[error("camera unsupported: {0}")]
    UnsupportedEnvironment(String),
    /// Capture attempted without a live feed.
    #[error("camera is not active")]
    NoActiveStream,
    /// Stream was granted but the feed failed to play.
    #[error("camera playback failed: {0}")]
    PlaybackFailed(String),
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// JPEG encoding failed.
    #[error("jpeg encoding failed: {0}")]
    Encode(String),
    /// File picker failure.
    #[error("file picker failure: {0}")]
    Picker(String),
    /// Camera backend runtime failure.
    #[error("camera backend failure: {0}")]
    Backend(String),
    /// Produced image failed core validation.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CaptureError {
    /// Human-readable status line for this error.
    ///
    /// `local_host` selects between the permission wording used when served
    /// from localhost and the one used for remote hosts.
    pub fn status_message(&self, local_host: bool) -> String {
        match self {
            CaptureError::UnsupportedEnvironment(_) => {
                "Camera not supported in this environment or requires HTTPS.".to_string()
            }
            CaptureError::PermissionDenied(_) if local_host => {
                "Cannot access camera (check permissions).".to_string()
            }
            CaptureError::PermissionDenied(_) => {
                "Camera blocked (use localhost or HTTPS).".to_string()
            }
            CaptureError::NoActiveStream => "Camera is not active.".to_string(),
            CaptureError::PlaybackFailed(_) => "Camera started, but playback failed.".to_string(),
            CaptureError::Core(CoreError::EmptyImage) => "Selected file is empty.".to_string(),
            other => format!("Error: {other}"),
        }
    }
}
