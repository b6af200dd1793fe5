//! Validates contract fixtures against frozen JSON schemas and the parsers
//! the client uses.

use egg_scan_contract::{error_message, parse_history_response, parse_prediction_response};
use jsonschema::JSONSchema;
use serde_json::Value;

fn contract_path(relative: &str) -> String {
    format!("{}/../../contracts/{relative}", env!("CARGO_MANIFEST_DIR"))
}

fn read_raw(relative: &str) -> String {
    std::fs::read_to_string(contract_path(relative)).expect("json file should be readable")
}

fn load_json(relative: &str) -> Value {
    serde_json::from_str(&read_raw(relative)).expect("json file should be valid")
}

fn compile_validator(schema: &str) -> JSONSchema {
    let schema = load_json(schema);
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn predict_fixture_matches_schema() {
    let validator = compile_validator("predict-response.schema.json");
    let fixture = load_json("fixtures/predict-response.valid.json");
    assert!(
        validator.is_valid(&fixture),
        "predict fixture should validate against schema"
    );

    let response = parse_prediction_response(&read_raw("fixtures/predict-response.valid.json"))
        .expect("predict fixture should parse");
    assert_eq!(response.result, "Fresh");
    assert_eq!(response.confidence, 97.5);
    assert_eq!(response.probs.len(), 3);
}

#[test]
fn predict_schema_rejects_missing_confidence() {
    let validator = compile_validator("predict-response.schema.json");
    let invalid = serde_json::json!({ "result": "Fresh" });
    assert!(!validator.is_valid(&invalid));
    assert!(parse_prediction_response(&invalid.to_string()).is_err());
}

#[test]
fn history_fixture_matches_schema() {
    let validator = compile_validator("history-response.schema.json");
    let fixture = load_json("fixtures/history-response.valid.json");
    assert!(
        validator.is_valid(&fixture),
        "history fixture should validate against schema"
    );

    let records = parse_history_response(&read_raw("fixtures/history-response.valid.json"))
        .expect("history fixture should parse");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].result, "Fresh");
    assert_eq!(
        records[0].filename.as_deref(),
        Some("scan_20261014_120000.jpg")
    );
    assert_eq!(records[1].result, "Spoiled");
}

#[test]
fn history_schema_rejects_non_array() {
    let validator = compile_validator("history-response.schema.json");
    let invalid = serde_json::json!({ "error": "Database not connected" });
    assert!(!validator.is_valid(&invalid));
    assert!(parse_history_response(&invalid.to_string()).is_err());
}

#[test]
fn error_fixture_matches_schema() {
    let validator = compile_validator("error-response.schema.json");
    let fixture = load_json("fixtures/error-response.valid.json");
    assert!(
        validator.is_valid(&fixture),
        "error fixture should validate against schema"
    );
    assert_eq!(
        error_message(&read_raw("fixtures/error-response.valid.json")).as_deref(),
        Some("No file provided")
    );
}
