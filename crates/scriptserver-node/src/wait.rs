//! Waiting for, and judging, the response to a script line.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use scriptserver_core::{MatchOutcome, Policy, ScriptContext, ScriptLineParams, matcher};
use scriptserver_interfaces::{DatagramListener, Transport};

use crate::error::WaitError;

/// Limits applied to every wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    /// Seconds to wait when the line's timeout is 0.
    pub default_timeout: u64,
    pub max_dropped: usize,
}

/// How a wait ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `norecv`: nothing was awaited.
    Skipped,
    Accepted(String),
    /// The deadline passed and the policy tolerates that.
    TimedOut,
}

impl WaitOutcome {
    pub fn into_message(self) -> Option<String> {
        match self {
            WaitOutcome::Accepted(message) => Some(message),
            WaitOutcome::Skipped | WaitOutcome::TimedOut => None,
        }
    }
}

enum Verdict {
    Accept,
    Drop,
    Fail(usize),
}

fn judge(message: &str, params: &ScriptLineParams, ctx: &ScriptContext) -> Verdict {
    for (index, expectation) in params.expectations.iter().enumerate() {
        match matcher::evaluate(message, expectation, params.policy, ctx) {
            MatchOutcome::Ok => {}
            MatchOutcome::Drop => return Verdict::Drop,
            MatchOutcome::Failed => return Verdict::Fail(index),
        }
    }
    Verdict::Accept
}

fn timed_out(params: &ScriptLineParams, secs: u64) -> Result<WaitOutcome, WaitError> {
    let policy = params.policy;
    if policy.contains(Policy::FAILPASS) {
        info!(secs, "response not received, as expected");
    } else if policy.contains(Policy::FAILCONTINUE) {
        warn!(secs, "no response, test failed, continuing");
    } else if policy.contains(Policy::WAIT) {
        info!(secs, "wait done");
    } else {
        return Err(WaitError::Timeout(secs));
    }
    Ok(WaitOutcome::TimedOut)
}

fn strip_line_end(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

/// Wait for the response to `params` on its node's ack port.
///
/// Every datagram carrying a TAI timestamp updates the desync history,
/// whether or not it is accepted.
pub async fn wait_for_response<T: Transport>(
    transport: &T,
    params: &ScriptLineParams,
    ctx: &mut ScriptContext,
    settings: WaitSettings,
) -> Result<WaitOutcome, WaitError> {
    if params.policy.contains(Policy::NORECV) {
        return Ok(WaitOutcome::Skipped);
    }

    let secs = if params.has_explicit_timeout() {
        params.timeout
    } else {
        settings.default_timeout
    };
    let mut listener = transport.listen(params.node.ack_port).await?;
    let deadline = Instant::now() + Duration::from_secs(secs);
    let mut dropped = 0usize;

    loop {
        let Some(datagram) = listener.recv_until(deadline).await? else {
            return timed_out(params, secs);
        };
        let message = strip_line_end(String::from_utf8_lossy(&datagram).into_owned());
        info!(port = listener.port(), message = %message, "read udp");

        if let Some(desync) = ctx.observe_desync(&message) {
            info!(desync, average = ctx.desync.average(), "desync updated");
        }

        if !params.has_explicit_timeout() {
            return Ok(WaitOutcome::Accepted(message));
        }

        match judge(&message, params, ctx) {
            Verdict::Accept => return Ok(WaitOutcome::Accepted(message)),
            Verdict::Fail(index) => return Err(WaitError::Mismatch { index }),
            Verdict::Drop => {
                dropped += 1;
                if dropped >= settings.max_dropped {
                    return Err(WaitError::TooManyDropped(dropped));
                }
            }
        }
    }
}
