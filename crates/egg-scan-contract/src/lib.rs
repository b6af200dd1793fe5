#![warn(missing_docs)]
//! # egg-scan-contract
//!
//! ## Purpose
//! Defines the classification service wire contract and client-side mapping
//! helpers.
//!
//! ## Responsibilities
//! - Parse `/api/predict` success bodies.
//! - Parse `/api/history` arrays leniently, so malformed fields render as
//!   received instead of failing the whole batch.
//! - Extract human-readable messages from error bodies.
//!
//! ## Data flow
//! Raw response body -> [`parse_prediction_response`] /
//! [`parse_history_response`] -> [`PredictionRecord`] values for the history
//! log.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs so they never borrow transient network
//! buffers.
//!
//! ## Error model
//! Invalid JSON or a body of the wrong shape returns [`ContractError`].

use std::collections::BTreeMap;

use egg_scan_core::{Confidence, PredictionRecord, RecordTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

/// Multipart field name carrying the image.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Path of the prediction endpoint relative to the service base.
pub const PREDICT_PATH: &str = "api/predict";

/// Path of the history endpoint relative to the service base.
pub const HISTORY_PATH: &str = "api/history";

/// Successful body returned by the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Winning class label.
    pub result: String,
    /// Confidence of the winning label, as a percentage.
    pub confidence: f64,
    /// Per-class percentages.
    #[serde(default)]
    pub probs: BTreeMap<String, f64>,
    /// Location of the stored upload.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PredictionResponse {
    /// Converts the response into a record stamped with `timestamp`.
    pub fn into_record(self, timestamp: OffsetDateTime) -> PredictionRecord {
        PredictionRecord {
            timestamp: RecordTimestamp::Instant(timestamp),
            result: self.result,
            confidence: Confidence::Percent(self.confidence),
            probs: self.probs,
            image_url: self.image_url,
            filename: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    confidence: Value,
    #[serde(default)]
    probs: Value,
    #[serde(default)]
    image_url: Value,
    #[serde(default)]
    filename: Value,
}

impl HistoryEntry {
    fn into_record(self) -> PredictionRecord {
        let timestamp = match &self.timestamp {
            Value::String(text) => RecordTimestamp::parse(text),
            other => RecordTimestamp::Raw(value_text(other)),
        };

        let confidence = match &self.confidence {
            Value::Null => Confidence::Raw(String::new()),
            other => Confidence::from_json(other),
        };

        let probs = match &self.probs {
            Value::Object(entries) => entries
                .iter()
                .filter_map(|(label, value)| Some((label.clone(), value.as_f64()?)))
                .collect(),
            _ => BTreeMap::new(),
        };

        PredictionRecord {
            timestamp,
            result: value_text(&self.result),
            confidence,
            probs,
            image_url: self.image_url.as_str().map(str::to_string),
            filename: self.filename.as_str().map(str::to_string),
        }
    }
}

/// Renders a JSON value the way a row shows it: strings verbatim, null as
/// empty, anything else as JSON text.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parses a prediction endpoint success body.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON or missing/mistyped
/// `result` and `confidence` fields.
pub fn parse_prediction_response(raw: &str) -> Result<PredictionResponse, ContractError> {
    serde_json::from_str(raw).map_err(ContractError::Decode)
}

/// Parses a history endpoint body into records, preserving order.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON and
/// [`ContractError::InvalidContract`] when the body is not an array of
/// objects.
pub fn parse_history_response(raw: &str) -> Result<Vec<PredictionRecord>, ContractError> {
    let parsed: Value = serde_json::from_str(raw).map_err(ContractError::Decode)?;
    let Value::Array(items) = parsed else {
        return Err(ContractError::InvalidContract(
            "history body is not an array".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(ContractError::InvalidContract(format!(
                    "history entry {index} is not an object"
                )));
            }
            let entry = serde_json::from_value::<HistoryEntry>(item)?;
            Ok(entry.into_record())
        })
        .collect()
}

/// Extracts the message to surface from an error body.
///
/// A JSON object carrying an `error` string yields that string; any other
/// non-blank body is returned exactly as received. Blank bodies yield `None`.
pub fn error_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body)
        && let Some(Value::String(message)) = fields.get("error")
    {
        return Some(message.clone());
    }

    Some(body.to_string())
}

/// Wire contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed body violates contract shape.
    #[error("response contract violation: {0}")]
    InvalidContract(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for lenient history parsing and error extraction.

    use super::*;

    #[test]
    fn history_keeps_order_and_raw_values() {
        let raw = r#"[
            {"timestamp":"2026-10-01T08:00:00Z","result":"Fresh","confidence":91.5},
            {"timestamp":"not a date","result":42,"confidence":"n/a"}
        ]"#;

        let records = parse_history_response(raw).expect("history should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result, "Fresh");
        assert_eq!(records[0].confidence, Confidence::Percent(91.5));
        assert_eq!(records[1].result, "42");
        assert_eq!(records[1].confidence.to_string(), "n/a");
        assert_eq!(
            records[1].timestamp,
            RecordTimestamp::Raw("not a date".to_string())
        );
    }

    #[test]
    fn history_rejects_non_array() {
        assert!(matches!(
            parse_history_response(r#"{"error":"Database not connected"}"#),
            Err(ContractError::InvalidContract(_))
        ));
    }

    #[test]
    fn prediction_requires_numeric_confidence() {
        assert!(parse_prediction_response(r#"{"result":"Fresh","confidence":"high"}"#).is_err());

        let parsed = parse_prediction_response(
            r#"{"result":"Spoiled","confidence":88.4,"probs":{"Fresh":10.1,"Invalid":1.5,"Spoiled":88.4}}"#,
        )
        .expect("prediction should parse");
        assert_eq!(parsed.probs.len(), 3);
        assert_eq!(parsed.image_url, None);
    }

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(
            error_message(r#"{"error":"Invalid file"}"#).as_deref(),
            Some("Invalid file")
        );
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn error_message_keeps_other_bodies_verbatim() {
        assert_eq!(
            error_message("model unavailable\n").as_deref(),
            Some("model unavailable\n")
        );
        assert_eq!(
            error_message(r#"{"detail":"busy"}"#).as_deref(),
            Some(r#"{"detail":"busy"}"#)
        );
        assert_eq!(
            error_message(r#"{"error":42}"#).as_deref(),
            Some(r#"{"error":42}"#)
        );
    }
}
