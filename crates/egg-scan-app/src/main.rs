#![warn(missing_docs)]
//! # egg-scan binary
//!
//! Headless entry point. Loads the history batch, then stages and submits
//! each image path given on the command line through the same action
//! handlers a graphical host uses.

use std::sync::Arc;

use egg_scan_app::{ScannerApp, ScannerConfig, app_version};
use egg_scan_capture::{PathFilePicker, UnsupportedCamera};
use egg_scan_upload::ReqwestTransport;
use log::{error, info};

/// CLI entry point.
fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(message) = run() {
        error!("{message}");
        eprintln!("egg-scan: {message}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config = ScannerConfig::from_env().map_err(|error| error.to_string())?;
    println!("egg-scan {}", app_version());
    println!("predict_url={}", config.predict_url);
    println!("history_url={}", config.history_url);

    let picker = PathFilePicker::new(std::env::args().skip(1));
    let queued = picker.remaining();

    let transport = ReqwestTransport::new(config.timeout).map_err(|error| error.to_string())?;
    let mut app = ScannerApp::new(
        &config,
        Arc::new(UnsupportedCamera),
        Box::new(picker),
        Arc::new(transport),
    )
    .map_err(|error| error.to_string())?;

    if let Err(error) = app.load_history() {
        info!("continuing without history: {error}");
    }

    for _ in 0..queued {
        match app.choose_and_submit() {
            Ok(Some(record)) => info!("scanned: {}", record.result),
            Ok(None) => info!("nothing submitted"),
            Err(error) => info!("scan failed: {error}"),
        }
        println!("{}", app.ui().status_text);
    }

    let view = app.view();
    println!("history ({} rows)", view.history.len());
    for row in view.history {
        println!("{} | {} | {}", row.timestamp, row.result, row.confidence);
    }

    Ok(())
}
