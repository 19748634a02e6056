//! Tracing subscriber configuration for the script server.
//!
//! Log levels follow these conventions:
//! - ERROR: Run-stopping failures (socket errors, bad script lines)
//! - WARN: Tolerated failures (timeouts under `failcontinue`, skipped copies)
//! - INFO: Test progress (`BeginMessage`, datagrams sent and read, verdicts)
//! - DEBUG: Field locations, placeholder expansion, store updates
//!
//! `RUST_LOG` overrides the configured level when set.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::error::NodeError;

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Stdout, teed into `file` when one is given.
fn writer(file: Option<&Path>) -> Result<BoxMakeWriter, NodeError> {
    let Some(path) = file else {
        return Ok(BoxMakeWriter::new(std::io::stdout));
    };
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NodeError::Logging(format!("cannot open {}: {e}", path.display())))?;
    Ok(BoxMakeWriter::new(std::io::stdout.and(Mutex::new(log))))
}

/// Initialize the tracing subscriber with human-readable output.
pub fn init(level: &str, file: Option<&Path>) -> Result<(), NodeError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(writer(file)?)
        .with_ansi(file.is_none())
        .try_init()
        .map_err(|e| NodeError::Logging(e.to_string()))
}

/// Initialize the tracing subscriber with JSON output.
///
/// Activated by setting `RUST_LOG_FORMAT=json`.
pub fn init_json(level: &str, file: Option<&Path>) -> Result<(), NodeError> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(level))
        .with_writer(writer(file)?)
        .try_init()
        .map_err(|e| NodeError::Logging(e.to_string()))
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` to avoid panicking if called multiple times.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
