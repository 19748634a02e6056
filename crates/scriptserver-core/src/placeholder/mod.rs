//! `{command params}` macro expansion.
//!
//! Text outside braces is copied through unchanged. Each placeholder is
//! replaced by the output of the handler registered under its command name.
//! Parameters are split on whitespace onto a fresh operand stack; a token made
//! only of hex digits is pushed as an integer, anything else as text.

mod handlers;

use std::collections::HashMap;

use tracing::debug;

pub use handlers::{encode_loop_index, encode_loop_index_ext};

use crate::context::ScriptContext;
use crate::error::ExpandError;

/// One parameter pushed onto the operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// An all-hex-digit token. The source token is kept for handlers that
    /// want a name rather than a number.
    Int { value: u64, token: String },
    Text(String),
}

impl Operand {
    pub fn from_token(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(value) = u64::from_str_radix(token, 16) {
                return Operand::Int {
                    value,
                    token: token.to_string(),
                };
            }
        }
        Operand::Text(token.to_string())
    }

    /// The token as written in the placeholder.
    pub fn as_text(&self) -> &str {
        match self {
            Operand::Int { token, .. } => token,
            Operand::Text(text) => text,
        }
    }
}

/// Placeholder handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// `TAIOFFSET <off>`: device time plus an offset and the desync correction.
    TaiOffset,
    /// `DIDX`: loop index as two hex digits.
    LoopIndex,
    /// `DIDX_EXTDLUINT`: loop index in the one- or two-byte extended encoding.
    LoopIndexExt,
    /// `LOAD <name> [off]`: stored hex value plus an offset.
    Load,
    /// Any exported configuration variable, looked up by command name.
    Config,
}

impl Handler {
    fn invoke(
        self,
        command: &str,
        stack: &mut Vec<Operand>,
        ctx: &ScriptContext,
    ) -> Result<String, ExpandError> {
        match self {
            Handler::TaiOffset => handlers::tai_offset(stack, ctx),
            Handler::LoopIndex => Ok(encode_loop_index(ctx.loop_index)),
            Handler::LoopIndexExt => Ok(encode_loop_index_ext(ctx.loop_index)),
            Handler::Load => handlers::load(stack, ctx),
            Handler::Config => handlers::config(command, ctx),
        }
    }
}

const BUILTINS: &[(&str, Handler)] = &[
    ("TAIOFFSET", Handler::TaiOffset),
    ("DIDX", Handler::LoopIndex),
    ("DIDX_EXTDLUINT", Handler::LoopIndexExt),
    ("LOAD", Handler::Load),
];

/// Command name to handler table.
#[derive(Debug, Clone)]
pub struct PlaceholderRegistry {
    handlers: HashMap<String, Handler>,
}

impl Default for PlaceholderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderRegistry {
    /// A registry holding only the built-in handlers.
    pub fn new() -> Self {
        let handlers = BUILTINS
            .iter()
            .map(|(name, handler)| (name.to_string(), *handler))
            .collect();
        Self { handlers }
    }

    /// Route `name` to the config-lookup handler. Built-in names are not replaced.
    pub fn register_export(&mut self, name: &str) {
        self.handlers
            .entry(name.to_string())
            .or_insert(Handler::Config);
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }

    /// Expand every placeholder in `text`. Any failure discards the whole output.
    pub fn expand(&self, text: &str, ctx: &ScriptContext) -> Result<String, ExpandError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let body = &rest[open + 1..];

            let cmd_len = body
                .find(|c: char| !is_command_char(c))
                .unwrap_or(body.len());
            if cmd_len == body.len() {
                return Err(ExpandError::Unterminated(text.to_string()));
            }
            if cmd_len == 0 {
                return Err(ExpandError::EmptyCommand);
            }
            let command = &body[..cmd_len];

            let after_cmd = body[cmd_len..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
            let Some(close) = after_cmd.find('}') else {
                return Err(ExpandError::Unterminated(text.to_string()));
            };
            let params = &after_cmd[..close];

            let handler = self
                .handler(command)
                .ok_or_else(|| ExpandError::UnknownCommand(command.to_string()))?;
            let mut stack: Vec<Operand> = params.split_whitespace().map(Operand::from_token).collect();
            let value = handler.invoke(command, &mut stack, ctx)?;
            debug!(command, params, value = %value, "expanded placeholder");
            out.push_str(&value);

            rest = &after_cmd[close + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

fn is_command_char(c: char) -> bool {
    c.is_ascii_graphic() && c != '{' && c != '}' && c != ','
}
