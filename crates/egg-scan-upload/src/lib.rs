#![warn(missing_docs)]
//! # egg-scan-upload
//!
//! ## Purpose
//! Sends staged images to the prediction endpoint and fetches the history
//! batch.
//!
//! ## Responsibilities
//! - Validate endpoint URLs (`http`/`https` only).
//! - Package one image as a multipart upload with field `file`.
//! - Map non-2xx replies and transport failures into [`UploadError`].
//! - Provide a blocking `reqwest` transport behind the [`ScanTransport`]
//!   trait so tests can substitute in-memory transports.
//!
//! ## Data flow
//! [`ImageUpload`] -> [`ScanClient::predict`] -> [`ScanTransport::post_image`]
//! -> [`HttpReply`] -> parsed [`PredictionResponse`].
//!
//! ## Error model
//! Exactly one attempt is made per call; there is no retry loop. Callers
//! surface [`UploadError::user_message`] and let the user trigger again.

use std::sync::Arc;
use std::time::Duration;

use egg_scan_contract::{
    ContractError, PredictionResponse, UPLOAD_FIELD_NAME, error_message, parse_history_response,
    parse_prediction_response,
};
use egg_scan_core::{PendingImage, PredictionRecord};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One image packaged for upload. Owns its bytes so an in-flight request is
/// independent of preview state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// File name reported in the multipart part.
    pub file_name: String,
    /// MIME type of the part.
    pub mime: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

impl From<&PendingImage> for ImageUpload {
    fn from(image: &PendingImage) -> Self {
        Self {
            file_name: image.file_name().to_string(),
            mime: image.media_type().mime().to_string(),
            bytes: image.bytes().to_vec(),
        }
    }
}

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl HttpReply {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstract HTTP transport used by [`ScanClient`].
pub trait ScanTransport: Send + Sync {
    /// POSTs `upload` as a multipart form to `endpoint`.
    fn post_image(&self, endpoint: &Url, upload: &ImageUpload) -> Result<HttpReply, UploadError>;

    /// GETs `endpoint` without a body.
    fn get(&self, endpoint: &Url) -> Result<HttpReply, UploadError>;
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport with a per-request timeout.
    ///
    /// # Errors
    /// Returns [`UploadError::Transport`] when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| UploadError::Transport(error.to_string()))?;
        Ok(Self { client })
    }
}

impl ScanTransport for ReqwestTransport {
    fn post_image(&self, endpoint: &Url, upload: &ImageUpload) -> Result<HttpReply, UploadError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime)
            .map_err(|error| UploadError::Transport(error.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD_NAME, part);

        let response = self
            .client
            .post(endpoint.clone())
            .multipart(form)
            .send()
            .map_err(|error| UploadError::Transport(error.to_string()))?;
        read_reply(response)
    }

    fn get(&self, endpoint: &Url) -> Result<HttpReply, UploadError> {
        let response = self
            .client
            .get(endpoint.clone())
            .send()
            .map_err(|error| UploadError::Transport(error.to_string()))?;
        read_reply(response)
    }
}

fn read_reply(response: reqwest::blocking::Response) -> Result<HttpReply, UploadError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|error| UploadError::Transport(error.to_string()))?;
    Ok(HttpReply { status, body })
}

/// Client for the prediction and history endpoints.
#[derive(Clone)]
pub struct ScanClient {
    predict_url: Url,
    history_url: Url,
    transport: Arc<dyn ScanTransport>,
}

impl ScanClient {
    /// Creates a client with validated endpoints.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] for unparsable URLs or
    /// schemes other than `http`/`https`.
    pub fn new(
        predict_url: &str,
        history_url: &str,
        transport: Arc<dyn ScanTransport>,
    ) -> Result<Self, UploadError> {
        Ok(Self {
            predict_url: validate_endpoint(predict_url)?,
            history_url: validate_endpoint(history_url)?,
            transport,
        })
    }

    /// Prediction endpoint.
    pub fn predict_url(&self) -> &Url {
        &self.predict_url
    }

    /// History endpoint.
    pub fn history_url(&self) -> &Url {
        &self.history_url
    }

    /// Uploads one image and parses the classification.
    ///
    /// # Errors
    /// Returns [`UploadError::RequestFailed`] for non-2xx replies,
    /// [`UploadError::Transport`] for connection failures and
    /// [`UploadError::Contract`] for malformed success bodies.
    pub fn predict(&self, upload: &ImageUpload) -> Result<PredictionResponse, UploadError> {
        info!(
            "submitting {} ({}, {} bytes) to {}",
            upload.file_name,
            upload.mime,
            upload.bytes.len(),
            self.predict_url
        );
        let reply = self.transport.post_image(&self.predict_url, upload)?;
        let body = ensure_success(reply)?;
        let response = parse_prediction_response(&body)?;
        debug!(
            "prediction result={} confidence={}",
            response.result, response.confidence
        );
        Ok(response)
    }

    /// Fetches the full history batch in the order the store returns it.
    ///
    /// # Errors
    /// Same classes as [`ScanClient::predict`].
    pub fn fetch_history(&self) -> Result<Vec<PredictionRecord>, UploadError> {
        let reply = self.transport.get(&self.history_url)?;
        let body = ensure_success(reply)?;
        let records = parse_history_response(&body)?;
        info!("loaded {} history records", records.len());
        Ok(records)
    }
}

fn ensure_success(reply: HttpReply) -> Result<String, UploadError> {
    if reply.is_success() {
        return Ok(reply.body);
    }

    let message = error_message(&reply.body).unwrap_or_else(|| format!("HTTP {}", reply.status));
    warn!("request failed with status {}: {message}", reply.status);
    Err(UploadError::RequestFailed {
        status: reply.status,
        message,
    })
}

/// Validates an endpoint URL.
///
/// # Errors
/// Returns [`UploadError::InvalidEndpoint`] for parse failures or schemes
/// other than `http`/`https`.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, UploadError> {
    let parsed = Url::parse(endpoint).map_err(|error| {
        UploadError::InvalidEndpoint(format!("invalid url {endpoint}: {error}"))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(UploadError::InvalidEndpoint(format!(
            "unsupported scheme {other} in {endpoint}"
        ))),
    }
}

/// Coarse failure category used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Service reported a 5xx status.
    Server,
    /// Service rejected the request with a 4xx (or other non-2xx) status.
    Client,
    /// Connection or I/O failure before a status was received.
    Transport,
    /// 2xx body did not match the contract.
    Contract,
    /// Client was misconfigured.
    Configuration,
}

/// Classifies an upload error.
pub fn classify_upload_error(error: &UploadError) -> FailureClass {
    match error {
        UploadError::RequestFailed { status, .. } if (500..600).contains(status) => {
            FailureClass::Server
        }
        UploadError::RequestFailed { .. } => FailureClass::Client,
        UploadError::Transport(_) => FailureClass::Transport,
        UploadError::Contract(_) => FailureClass::Contract,
        UploadError::InvalidEndpoint(_) => FailureClass::Configuration,
    }
}

/// Upload and history fetch errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Endpoint URL is unusable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Service answered with a non-2xx status.
    #[error("request failed with status {status}: {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Server-provided error text.
        message: String,
    },
    /// Network or connection failure.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Success body violated the wire contract.
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl UploadError {
    /// Message shown after `Error: ` in the status line.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::RequestFailed { message, .. } => message.clone(),
            UploadError::Transport(description) => description.clone(),
            other => other.to_string(),
        }
    }
}
