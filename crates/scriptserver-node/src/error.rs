//! Error types for the script runner and binary.

use scriptserver_interfaces::InterfaceError;

/// Errors that stop the whole run. Script failures are reported through
/// [`crate::runner::RunStatus`] instead.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("interface error: {0}")]
    Interface(#[from] InterfaceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Why a wait for a response did not produce an accepted datagram.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("no response in {0} seconds")]
    Timeout(u64),
    #[error("response failed expectation {index}")]
    Mismatch { index: usize },
    #[error("gave up after dropping {0} responses")]
    TooManyDropped(usize),
    #[error("interface error: {0}")]
    Interface(#[from] InterfaceError),
}
