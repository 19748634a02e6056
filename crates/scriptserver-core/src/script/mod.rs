//! Parsed representation of a script line and the line parser.

mod parser;

pub use parser::{parse_line, parse_offset_expression};

use crate::constants::{Field, MessageType, Operator};
use crate::directory::RfNode;
use crate::policy::Policy;
use crate::store::Transform;

/// Repetition range of the outbound send, with hex bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSpec {
    pub start: u32,
    pub end: u32,
    pub increment: u32,
}

impl Default for LoopSpec {
    fn default() -> Self {
        Self {
            start: 0,
            end: 1,
            increment: 1,
        }
    }
}

impl LoopSpec {
    /// Parse `start;end;increment` in hex.
    ///
    /// Parsing stops at the first value that is not hex. Fewer than two values
    /// give a single pass, and a missing or zero increment becomes 1.
    pub fn parse(text: &str) -> Self {
        let values: Vec<u32> = text
            .split(';')
            .map_while(|v| u32::from_str_radix(v.trim(), 16).ok())
            .take(3)
            .collect();
        match values.as_slice() {
            [start, end, rest @ ..] => Self {
                start: *start,
                end: *end,
                increment: rest.first().copied().filter(|i| *i != 0).unwrap_or(1),
            },
            _ => Self::default(),
        }
    }

    pub fn indices(&self) -> impl Iterator<Item = u32> + use<> {
        (self.start..self.end).step_by(self.increment.max(1) as usize)
    }

    /// Whether the range yields more than one index.
    pub fn is_repeated(&self) -> bool {
        self.indices().nth(1).is_some()
    }
}

/// One wait/match rule applied to a received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub op: Operator,
    pub type_check: bool,
    pub bit_check: bool,
    pub reverse: bool,
    /// Key of the stored value the expected data was derived from.
    pub stored_ref: Option<String>,
    pub src_layer: Option<Field>,
    pub src_offset: usize,
    pub src_size: usize,
    pub msg_type: MessageType,
    /// Field compared; `None` is the message start.
    pub layer: Option<Field>,
    pub offset: usize,
    pub size: usize,
    pub data: String,
}

/// Save of a received field into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRule {
    pub key: Option<String>,
    pub transform: Option<Transform>,
    /// Bytes to save; 0 saves the whole message.
    pub size: usize,
    pub src_layer: Option<Field>,
    pub src_offset: usize,
}

/// Copy of a field of the received message, or of a stored value, into the
/// outbound template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRule {
    /// Copy from this stored value instead of the received message.
    pub key: Option<String>,
    pub size: usize,
    pub src_layer: Option<Field>,
    pub src_offset: usize,
    pub dst_layer: Option<Field>,
    pub dst_offset: usize,
}

/// Everything one script line asks for.
#[derive(Debug, Clone)]
pub struct ScriptLineParams {
    pub description: String,
    pub node_name: String,
    pub node: RfNode,
    pub msg_type: Option<MessageType>,
    /// Response timeout in seconds; 0 selects the configured default.
    pub timeout: u64,
    pub policy: Policy,
    pub loop_spec: LoopSpec,
    pub expectations: Vec<Expectation>,
    pub stores: Vec<StoreRule>,
    pub copies: Vec<CopyRule>,
    pub template: String,
}

impl ScriptLineParams {
    /// Whether the line set its own timeout. Only such lines match responses.
    pub fn has_explicit_timeout(&self) -> bool {
        self.timeout != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_defaults_to_single_pass() {
        assert_eq!(LoopSpec::parse(""), LoopSpec::default());
        assert_eq!(LoopSpec::parse("5"), LoopSpec::default());
        assert_eq!(LoopSpec::default().indices().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn loop_hex_bounds() {
        let spec = LoopSpec::parse("0;3;1");
        assert_eq!(spec.indices().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(spec.is_repeated());
        let spec = LoopSpec::parse("a;10;4");
        assert_eq!(spec.indices().collect::<Vec<_>>(), vec![0xa, 0xe]);
    }

    #[test]
    fn loop_zero_or_missing_increment_is_one() {
        assert_eq!(LoopSpec::parse("0;2;0").increment, 1);
        assert_eq!(LoopSpec::parse("0;2").increment, 1);
        assert_eq!(LoopSpec::parse("0;2;zz").increment, 1);
    }

    #[test]
    fn empty_range_yields_nothing() {
        let spec = LoopSpec::parse("3;3;1");
        assert_eq!(spec.indices().count(), 0);
        assert!(!spec.is_repeated());
    }
}
