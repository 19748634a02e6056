//! UDP transport.
//!
//! Provides [`UdpTransport`]. Listeners are bound with `SO_REUSEADDR` on the
//! configured listen host. Sends go out from an ephemeral port.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::InterfaceError;
use crate::traits::{DatagramListener, MAX_DATAGRAM, Transport};

/// UDP transport bound to a local listen address.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    name: String,
    listen_host: IpAddr,
}

impl UdpTransport {
    pub fn new(listen_host: IpAddr) -> Self {
        Self {
            name: format!("UdpTransport[{listen_host}]"),
            listen_host,
        }
    }

    fn bind_listener(addr: SocketAddr) -> std::io::Result<std::net::UdpSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(addr))?;
        Ok(socket.into())
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// A bound UDP receive socket.
#[derive(Debug)]
pub struct UdpListener {
    socket: UdpSocket,
    port: u16,
    buf: Vec<u8>,
}

impl DatagramListener for UdpListener {
    fn port(&self) -> u16 {
        self.port
    }

    async fn recv_until(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>, InterfaceError> {
        match tokio::time::timeout_at(deadline, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((n, src))) => {
                debug!(port = self.port, %src, bytes = n, "datagram received");
                Ok(Some(self.buf[..n].to_vec()))
            }
            Ok(Err(e)) => Err(InterfaceError::ReceiveFailed(e.to_string())),
            Err(_) => Ok(None),
        }
    }
}

impl Transport for UdpTransport {
    type Listener = UdpListener;

    fn name(&self) -> &str {
        &self.name
    }

    async fn listen(&self, port: u16) -> Result<UdpListener, InterfaceError> {
        let addr = SocketAddr::new(self.listen_host, port);
        let std_socket =
            Self::bind_listener(addr).map_err(|source| InterfaceError::Bind { addr, source })?;
        let socket = UdpSocket::from_std(std_socket)?;
        let port = socket.local_addr()?.port();
        info!(host = %self.listen_host, port, "waiting");
        Ok(UdpListener {
            socket,
            port,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    async fn send(&self, host: &str, port: u16, data: &[u8]) -> Result<(), InterfaceError> {
        let target = tokio::net::lookup_host((host, port))
            .await
            .map_err(|_| InterfaceError::Resolve(host.to_string()))?
            .next()
            .ok_or_else(|| InterfaceError::Resolve(host.to_string()))?;

        let local = match target {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| InterfaceError::Bind { addr: local, source })?;

        let sent = socket.send_to(data, target).await?;
        if sent != data.len() {
            return Err(InterfaceError::TransmitFailed(format!(
                "sent {} of {} bytes",
                sent,
                data.len()
            )));
        }
        info!(host, port, message = %String::from_utf8_lossy(data), "sent");
        Ok(())
    }
}
