//! Error types for the scriptserver-core crate.

use crate::constants::{Field, MessageType};
use crate::policy::Policy;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy unknown: '{remainder}'")]
    Unrecognized { remainder: String, partial: Policy },
}

impl PolicyError {
    /// Flags decoded before the failure, with [`Policy::UNKNOWN`] set.
    pub fn flags(&self) -> Policy {
        match self {
            PolicyError::Unrecognized { partial, .. } => *partial,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("unterminated placeholder in '{0}'")]
    Unterminated(String),
    #[error("empty placeholder command")]
    EmptyCommand,
    #[error("no expansion found for '{0}'")]
    UnknownCommand(String),
    #[error("{command}: missing operand")]
    MissingOperand { command: &'static str },
    #[error("{command}: expected a hex operand, got '{token}'")]
    NotInteger { command: &'static str, token: String },
    #[error("LOAD: reference to undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("LOAD: stored value '{value}' of '{key}' is not hex")]
    NotHex { key: String, value: String },
    #[error("{command}: arithmetic overflow")]
    Overflow { command: &'static str },
    #[error("config variable '{0}' has no value")]
    MissingExport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("invalid transform '{0}'")]
    Invalid(String),
    #[error("'{0}' is not a hex value")]
    NotHex(String),
    #[error("arithmetic overflow applying '{0}'")]
    Overflow(String),
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("{field} is not part of the {msg_type} layout")]
    NotInLayout { msg_type: MessageType, field: Field },
    #[error("malformed message: needed {expected} delimiters, found {found}")]
    Malformed { expected: usize, found: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("expected 'host ack_port send_port', got '{0}'")]
    Malformed(String),
    #[error("invalid port '{0}'")]
    Port(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("copy source: {0}")]
    Source(FieldError),
    #[error("copy destination: {0}")]
    Destination(FieldError),
    #[error("no inbound message to copy from")]
    NoSource,
    #[error("outbound template has no message type")]
    NoDestinationType,
    #[error("source offset {offset} is beyond the source data")]
    SourceOffset { offset: usize },
    #[error("invalid offset specified for copy destination: {offset}")]
    DestinationOffset { offset: usize },
    #[error("copied template is not valid UTF-8")]
    NotUtf8,
    #[error("store transform failed: {0}")]
    Transform(#[from] TransformError),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty script line")]
    Empty,
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("RF node '{0}' not specified")]
    UnknownNode(String),
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("invalid {what}: '{value}'")]
    InvalidNumber { what: &'static str, value: String },
    #[error("{record} record has {found} fields, expected {expected}")]
    FieldCount {
        record: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("undefined reference to stored id '{0}'")]
    UndefinedReference(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("placeholder expansion failed: {0}")]
    Expand(#[from] ExpandError),
    #[error("stored comparison transform failed: {0}")]
    Transform(#[from] TransformError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_exposes_flags() {
        let err = PolicyError::Unrecognized {
            remainder: "bogus".into(),
            partial: Policy::NOSEND | Policy::UNKNOWN,
        };
        assert!(err.flags().contains(Policy::UNKNOWN));
        assert_eq!(err.to_string(), "policy unknown: 'bogus'");
    }

    #[test]
    fn field_error_display() {
        let err = FieldError::NotInLayout {
            msg_type: MessageType::RxCfg,
            field: Field::Dll,
        };
        assert_eq!(err.to_string(), "DLL is not part of the RX_CFG layout");
    }

    #[test]
    fn parse_error_from_expand() {
        let err: ParseError = ExpandError::UnknownCommand("NOPE".into()).into();
        assert!(matches!(err, ParseError::Expand(_)));
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn copy_error_from_transform() {
        let err: CopyError = TransformError::DivisionByZero.into();
        assert!(matches!(err, CopyError::Transform(_)));
    }
}
