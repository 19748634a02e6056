//! In-memory transport and generic conformance assertions for [`Transport`]
//! implementations.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scriptserver_interfaces::testing::ScriptedTransport;
//!
//! let transport = ScriptedTransport::new();
//! transport.push_inbound("RX_CFG,1,00");
//! transport.reply_on_send("TX_CFG,1,AA", "RX_CFG,2,BB");
//! // ... run the script ...
//! assert_eq!(transport.sent_messages(), vec!["TX_CFG,1,AA,..."]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::InterfaceError;
use crate::traits::{DatagramListener, Transport};

/// A datagram handed to [`Transport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub host: String,
    pub port: u16,
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct ReplyRule {
    trigger: String,
    /// Fire on this matching send only (1-based); every match when `None`.
    nth: Option<usize>,
    seen: usize,
    reply: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<SentDatagram>,
    listened: Vec<u16>,
    rules: Vec<ReplyRule>,
    fail_listen: bool,
}

/// Transport that records sends and serves datagrams from an in-memory queue.
///
/// Any listener receives from the same queue. An empty queue makes
/// `recv_until` sleep until its deadline, so tests should run with paused time.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a datagram for the next receive.
    pub fn push_inbound(&self, data: impl Into<Vec<u8>>) {
        self.lock().inbound.push_back(data.into());
    }

    /// Queue `reply` whenever a sent datagram contains `trigger`.
    pub fn reply_on_send(&self, trigger: &str, reply: impl Into<Vec<u8>>) {
        self.lock().rules.push(ReplyRule {
            trigger: trigger.to_string(),
            nth: None,
            seen: 0,
            reply: reply.into(),
        });
    }

    /// Queue `reply` only on the `nth` (1-based) send containing `trigger`.
    pub fn reply_on_nth_send(&self, trigger: &str, nth: usize, reply: impl Into<Vec<u8>>) {
        self.lock().rules.push(ReplyRule {
            trigger: trigger.to_string(),
            nth: Some(nth),
            seen: 0,
            reply: reply.into(),
        });
    }

    /// Make every later `listen` fail as if the port were taken.
    pub fn fail_listen(&self) {
        self.lock().fail_listen = true;
    }

    pub fn sent(&self) -> Vec<SentDatagram> {
        self.lock().sent.clone()
    }

    /// Sent payloads as text.
    pub fn sent_messages(&self) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .map(|d| String::from_utf8_lossy(&d.data).into_owned())
            .collect()
    }

    /// Ports passed to `listen`, in call order.
    pub fn listened_ports(&self) -> Vec<u16> {
        self.lock().listened.clone()
    }

    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }
}

/// Listener handed out by [`ScriptedTransport`].
#[derive(Debug)]
pub struct ScriptedListener {
    state: Arc<Mutex<State>>,
    port: u16,
}

impl DatagramListener for ScriptedListener {
    fn port(&self) -> u16 {
        self.port
    }

    async fn recv_until(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>, InterfaceError> {
        let next = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inbound
            .pop_front();
        match next {
            Some(data) => Ok(Some(data)),
            None => {
                tokio::time::sleep_until(deadline).await;
                Ok(None)
            }
        }
    }
}

impl Transport for ScriptedTransport {
    type Listener = ScriptedListener;

    fn name(&self) -> &str {
        "ScriptedTransport"
    }

    async fn listen(&self, port: u16) -> Result<ScriptedListener, InterfaceError> {
        let mut state = self.lock();
        if state.fail_listen {
            return Err(InterfaceError::Bind {
                addr: std::net::SocketAddr::from(([0, 0, 0, 0], port)),
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
            });
        }
        state.listened.push(port);
        Ok(ScriptedListener {
            state: Arc::clone(&self.state),
            port,
        })
    }

    async fn send(&self, host: &str, port: u16, data: &[u8]) -> Result<(), InterfaceError> {
        let mut state = self.lock();
        state.sent.push(SentDatagram {
            host: host.to_string(),
            port,
            data: data.to_vec(),
        });

        let text = String::from_utf8_lossy(data);
        let mut replies = Vec::new();
        for rule in state.rules.iter_mut() {
            if !text.contains(rule.trigger.as_str()) {
                continue;
            }
            rule.seen += 1;
            if rule.nth.is_none_or(|n| n == rule.seen) {
                replies.push(rule.reply.clone());
            }
        }
        state.inbound.extend(replies);
        Ok(())
    }
}

/// Assert that a listener with no traffic returns `None` once its deadline passes.
pub async fn assert_recv_times_out(listener: &mut impl DatagramListener, wait: Duration) {
    let result = listener.recv_until(Instant::now() + wait).await;
    assert!(
        matches!(result, Ok(None)),
        "recv_until should time out without traffic: {result:?}"
    );
}

/// Assert that a datagram sent to a listening port is received intact.
pub async fn assert_send_is_received(transport: &impl Transport, host: &str) {
    let mut listener = transport.listen(0).await.expect("listen should succeed");
    let payload = b"TX_CFG,1,0102,0001,0002";
    transport
        .send(host, listener.port(), payload)
        .await
        .expect("send should succeed");
    let received = listener
        .recv_until(Instant::now() + Duration::from_secs(2))
        .await
        .expect("receive should succeed");
    assert_eq!(received.as_deref(), Some(&payload[..]));
}

/// Run all conformance checks on a transport.
///
/// This is a convenience that calls:
/// - [`assert_send_is_received`]
/// - [`assert_recv_times_out`]
pub async fn assert_transport_conformance(transport: &impl Transport, host: &str) {
    assert!(!transport.name().is_empty(), "transport name must not be empty");
    assert_send_is_received(transport, host).await;
    let mut listener = transport.listen(0).await.expect("listen should succeed");
    assert_recv_times_out(&mut listener, Duration::from_millis(50)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn queued_datagrams_are_served_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_inbound("RX_CFG,1,A");
        transport.push_inbound("RX_CFG,2,B");
        let mut listener = transport.listen(5000).await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(listener.recv_until(deadline).await.unwrap().unwrap(), b"RX_CFG,1,A");
        assert_eq!(listener.recv_until(deadline).await.unwrap().unwrap(), b"RX_CFG,2,B");
        assert_eq!(listener.recv_until(deadline).await.unwrap(), None);
        assert_eq!(transport.listened_ports(), vec![5000]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_waits_for_the_deadline() {
        let transport = ScriptedTransport::new();
        let mut listener = transport.listen(1).await.unwrap();
        let start = Instant::now();
        assert_recv_times_out(&mut listener, Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn replies_follow_sends() {
        let transport = ScriptedTransport::new();
        transport.reply_on_send("TX_RF", "RX_RF,1,OK");
        transport.reply_on_nth_send("TX_CFG", 2, "RX_CFG,1,SECOND");

        transport.send("h", 1, b"TX_CFG,1").await.unwrap();
        assert_eq!(transport.pending_inbound(), 0);
        transport.send("h", 1, b"TX_CFG,2").await.unwrap();
        transport.send("h", 1, b"TX_RF,3").await.unwrap();
        assert_eq!(transport.pending_inbound(), 2);
        assert_eq!(
            transport.sent_messages(),
            vec!["TX_CFG,1", "TX_CFG,2", "TX_RF,3"]
        );
        assert_eq!(transport.sent()[0].host, "h");
    }

    #[tokio::test(start_paused = true)]
    async fn listen_failure_is_reported() {
        let transport = ScriptedTransport::new();
        transport.fail_listen();
        assert!(matches!(
            transport.listen(5000).await,
            Err(InterfaceError::Bind { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn conformance() {
        assert_transport_conformance(&ScriptedTransport::new(), "any").await;
    }
}
