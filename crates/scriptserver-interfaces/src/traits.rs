//! Datagram transport traits.
//!
//! The runner never keeps a socket across operations: every wait binds a fresh
//! listener and every send uses a fresh socket.

use tokio::time::Instant;

use crate::error::InterfaceError;

/// Largest datagram accepted from the backbone router.
pub const MAX_DATAGRAM: usize = 65_535;

/// A bound receive socket.
pub trait DatagramListener: Send {
    /// Port the listener is bound to.
    fn port(&self) -> u16;

    /// Receive the next datagram, or `None` once `deadline` passes.
    fn recv_until(
        &mut self,
        deadline: Instant,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, InterfaceError>> + Send;
}

/// Per-operation datagram I/O towards RF nodes.
pub trait Transport: Send + Sync {
    type Listener: DatagramListener;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Bind a listener on `port`.
    fn listen(&self, port: u16) -> impl Future<Output = Result<Self::Listener, InterfaceError>> + Send;

    /// Send one datagram to `host:port`.
    fn send(
        &self,
        host: &str,
        port: u16,
        data: &[u8],
    ) -> impl Future<Output = Result<(), InterfaceError>> + Send;
}
