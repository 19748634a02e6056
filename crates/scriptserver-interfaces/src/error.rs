//! Error types for the interfaces layer.

use std::net::SocketAddr;

/// Errors that can occur during datagram I/O.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("cannot resolve host '{0}'")]
    Resolve(String),
    #[error("transmit failed: {0}")]
    TransmitFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}
