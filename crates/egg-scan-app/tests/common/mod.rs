//! Shared fixtures for app integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use egg_scan_app::{ScannerApp, ScannerConfig};
use egg_scan_capture::{PickedFile, QueuedFilePicker, SyntheticCamera};
use egg_scan_upload::{HttpReply, ImageUpload, ScanTransport, UploadError};
use time::UtcOffset;
use time::macros::datetime;
use url::Url;

/// In-memory transport that replays scripted replies and records requests.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct ScriptedTransport {
    predict_replies: Mutex<VecDeque<Result<HttpReply, UploadError>>>,
    history_reply: Mutex<Option<Result<HttpReply, UploadError>>>,
    uploads: Mutex<Vec<ImageUpload>>,
    history_calls: Mutex<u32>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_predict(&self, reply: Result<HttpReply, UploadError>) {
        self.predict_replies
            .lock()
            .expect("reply lock should work")
            .push_back(reply);
    }

    pub fn set_history(&self, reply: Result<HttpReply, UploadError>) {
        *self.history_reply.lock().expect("reply lock should work") = Some(reply);
    }

    pub fn uploads(&self) -> Vec<ImageUpload> {
        self.uploads
            .lock()
            .expect("upload lock should work")
            .clone()
    }

    pub fn history_calls(&self) -> u32 {
        *self.history_calls.lock().expect("call lock should work")
    }
}

impl ScanTransport for ScriptedTransport {
    fn post_image(&self, _endpoint: &Url, upload: &ImageUpload) -> Result<HttpReply, UploadError> {
        self.uploads
            .lock()
            .expect("upload lock should work")
            .push(upload.clone());
        self.predict_replies
            .lock()
            .expect("reply lock should work")
            .pop_front()
            .unwrap_or_else(|| Err(UploadError::Transport("no reply".to_string())))
    }

    fn get(&self, _endpoint: &Url) -> Result<HttpReply, UploadError> {
        *self.history_calls.lock().expect("call lock should work") += 1;
        self.history_reply
            .lock()
            .expect("reply lock should work")
            .take()
            .unwrap_or_else(|| ok_reply("[]"))
    }
}

/// Fixed instant used as the app clock in tests.
#[allow(dead_code)]
pub fn fixed_now() -> time::OffsetDateTime {
    datetime!(2026-10-14 12:00:00 UTC)
}

/// 200 reply with `body`.
#[allow(dead_code)]
pub fn ok_reply(body: &str) -> Result<HttpReply, UploadError> {
    Ok(HttpReply {
        status: 200,
        body: body.to_string(),
    })
}

/// Reply with `status` and `body`.
#[allow(dead_code)]
pub fn status_reply(status: u16, body: &str) -> Result<HttpReply, UploadError> {
    Ok(HttpReply {
        status,
        body: body.to_string(),
    })
}

/// Picked JPEG-named file fixture.
#[allow(dead_code)]
pub fn picked(name: &str) -> PickedFile {
    PickedFile {
        name: name.to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4],
    }
}

/// Local test configuration rendering timestamps in UTC.
#[allow(dead_code)]
pub fn test_config() -> ScannerConfig {
    let mut config = ScannerConfig::for_host("localhost").expect("config should build");
    config.display_offset = UtcOffset::UTC;
    config
}

/// Builds an app over the given collaborators with a fixed clock.
#[allow(dead_code)]
pub fn build_app(
    camera: &SyntheticCamera,
    files: Vec<PickedFile>,
    transport: &Arc<ScriptedTransport>,
) -> ScannerApp {
    ScannerApp::new(
        &test_config(),
        Arc::new(camera.clone()),
        Box::new(QueuedFilePicker::new(files)),
        transport.clone(),
    )
    .expect("app should build")
    .with_clock(fixed_now)
}
