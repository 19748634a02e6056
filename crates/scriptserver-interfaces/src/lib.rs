//! Datagram I/O for the RF script server.
//!
//! This crate provides the [`Transport`](traits::Transport) trait, its UDP
//! implementation on tokio, and an in-memory transport for tests.

pub mod error;
pub mod testing;
pub mod traits;
pub mod udp;

pub use error::InterfaceError;
pub use traits::{DatagramListener, Transport};
pub use udp::UdpTransport;
