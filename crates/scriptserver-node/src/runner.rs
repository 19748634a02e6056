//! Sequential execution of a script, one line at a time.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

use scriptserver_core::copy::{apply_copies, apply_stores};
use scriptserver_core::error::CopyError;
use scriptserver_core::script::parse_line;
use scriptserver_core::{MessageType, Policy, RfNode, ScriptContext, ScriptLineParams};
use scriptserver_interfaces::Transport;

use crate::config::RunnerSection;
use crate::error::{NodeError, WaitError};
use crate::wait::{WaitOutcome, WaitSettings, wait_for_response};

/// How a script run ended. Fatal errors are reported as [`NodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every line passed.
    EndOfInput,
    /// A line could not be parsed, expanded or got no valid response.
    Failed,
    /// A copy or store rule failed.
    CopyFailed,
}

impl RunStatus {
    /// Process exit code.
    pub fn code(self) -> i32 {
        match self {
            RunStatus::EndOfInput => 2,
            RunStatus::Failed => 3,
            RunStatus::CopyFailed => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub wait: WaitSettings,
    /// Pause between repetitions of a looped send.
    pub loop_delay: Duration,
}

impl From<&RunnerSection> for RunnerSettings {
    fn from(section: &RunnerSection) -> Self {
        Self {
            wait: WaitSettings {
                default_timeout: section.default_timeout,
                max_dropped: section.max_dropped,
            },
            loop_delay: section.loop_delay(),
        }
    }
}

/// Decode one raw script line, without its line ending.
fn decode_line(raw: &[u8]) -> Option<&str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw).ok()
}

/// The last datagram sent, kept without its timestamp suffix for one resend.
#[derive(Debug, Clone)]
struct LastSend {
    node: RfNode,
    text: String,
}

/// Runs script lines against RF nodes through a [`Transport`].
pub struct ScriptRunner<T: Transport> {
    transport: T,
    ctx: ScriptContext,
    settings: RunnerSettings,
    last_send: Option<LastSend>,
}

impl<T: Transport> ScriptRunner<T> {
    pub fn new(transport: T, ctx: ScriptContext, settings: RunnerSettings) -> Self {
        Self {
            transport,
            ctx,
            settings,
            last_send: None,
        }
    }

    pub fn context(&self) -> &ScriptContext {
        &self.ctx
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run every line of `script` until one fails or the input ends.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, mut script: R) -> Result<RunStatus, NodeError> {
        info!(transport = self.transport.name(), "script started");
        let mut raw = Vec::new();
        let mut line_no = 0usize;

        loop {
            raw.clear();
            if script.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            line_no += 1;
            let Some(line) = decode_line(&raw) else {
                info!(line = line_no, "BeginMessage");
                error!(line = line_no, code = RunStatus::Failed.code(), "Test failed: line is not valid UTF-8");
                info!(line = line_no, "EndMessage");
                return Ok(RunStatus::Failed);
            };
            if line.trim().is_empty() {
                continue;
            }
            info!(line = line_no, "BeginMessage");
            let failure = self.run_line(&line).await?;
            match failure {
                None => info!(line = line_no, "passed"),
                Some(status) => error!(line = line_no, code = status.code(), "Test failed"),
            }
            info!(line = line_no, "EndMessage");
            if let Some(status) = failure {
                return Ok(status);
            }
        }

        info!(lines = line_no, "end of script");
        Ok(RunStatus::EndOfInput)
    }

    /// Run a single line. Returns the status that ends the run, or `None`
    /// when the line passed.
    pub async fn run_line(&mut self, line: &str) -> Result<Option<RunStatus>, NodeError> {
        info!(line, "read csv");
        let params = match parse_line(line, &self.ctx) {
            Ok(params) => params,
            Err(err) => {
                error!(%err, "script line rejected");
                return Ok(Some(RunStatus::Failed));
            }
        };

        let inbound = match self.await_response(&params).await? {
            Ok(outcome) => outcome.into_message(),
            Err(err) => {
                error!(%err, description = %params.description, "no valid response");
                return Ok(Some(RunStatus::Failed));
            }
        };

        let template = match self.fill_template(&params, inbound.as_deref()) {
            Ok(template) => template,
            Err(err) => {
                error!(%err, "copy failed");
                return Ok(Some(RunStatus::CopyFailed));
            }
        };

        if template.is_empty() || params.policy.contains(Policy::NOSEND) {
            debug!("nothing to send");
            return Ok(None);
        }

        for (n, index) in params.loop_spec.indices().enumerate() {
            if n > 0 {
                tokio::time::sleep(self.settings.loop_delay).await;
            }
            self.ctx.loop_index = index;
            let text = match self.ctx.expand(&template) {
                Ok(text) => text,
                Err(err) => {
                    error!(%err, "template expansion failed");
                    return Ok(Some(RunStatus::Failed));
                }
            };
            self.send(&params.node, &text).await?;
            self.last_send = Some(LastSend {
                node: params.node.clone(),
                text,
            });
        }
        Ok(None)
    }

    async fn wait(&mut self, params: &ScriptLineParams) -> Result<Result<WaitOutcome, WaitError>, NodeError> {
        match wait_for_response(&self.transport, params, &mut self.ctx, self.settings.wait).await {
            Err(WaitError::Interface(err)) => Err(err.into()),
            other => Ok(other),
        }
    }

    /// Wait for the line's response, resending the previous datagram once if
    /// the first wait fails.
    async fn await_response(
        &mut self,
        params: &ScriptLineParams,
    ) -> Result<Result<WaitOutcome, WaitError>, NodeError> {
        let first = self.wait(params).await?;
        let Err(err) = first else {
            return Ok(first);
        };
        let Some(last) = self.last_send.take() else {
            return Ok(Err(err));
        };
        warn!(%err, host = %last.node.host, "resending previous message");
        self.send(&last.node, &last.text).await?;
        self.wait(params).await
    }

    fn fill_template(
        &mut self,
        params: &ScriptLineParams,
        inbound: Option<&str>,
    ) -> Result<String, CopyError> {
        let mut template = params.template.clone().into_bytes();
        apply_copies(&params.copies, inbound, &mut template, params.msg_type, &self.ctx)?;
        apply_stores(&params.stores, inbound, &mut self.ctx)?;
        String::from_utf8(template).map_err(|_| CopyError::NotUtf8)
    }

    /// Send `text`, adding a fresh timestamp suffix to outbound types.
    async fn send(&self, node: &RfNode, text: &str) -> Result<(), NodeError> {
        let mut wire = text.to_string();
        if MessageType::of_message(text).is_some_and(MessageType::is_outbound) {
            wire.push_str(&self.ctx.timestamp_suffix());
        }
        self.transport
            .send(&node.host, node.send_port, wire.as_bytes())
            .await?;
        info!(host = %node.host, port = node.send_port, message = %wire, "sent udp");
        Ok(())
    }
}
