//! Byte-offset addressing of fields inside flat delimited messages.

use crate::constants::{DELIMITER, Field, MessageType};
use crate::error::FieldError;
use crate::layout;

/// Byte offset just past the `count`-th delimiter of `bytes`.
pub fn skip_delimiters(bytes: &[u8], count: usize) -> Result<usize, FieldError> {
    let mut pos = 0;
    for found in 0..count {
        match bytes[pos..].iter().position(|b| *b == DELIMITER) {
            Some(i) => pos += i + 1,
            None => {
                return Err(FieldError::Malformed {
                    expected: count,
                    found,
                });
            }
        }
    }
    Ok(pos)
}

/// Delimiter count preceding `layer` in messages of `msg_type`.
///
/// `None` addresses the start of the message.
pub fn position(msg_type: MessageType, layer: Option<Field>) -> Result<usize, FieldError> {
    match layer {
        None => Ok(0),
        Some(field) => {
            layout::locate(msg_type, field).ok_or(FieldError::NotInLayout { msg_type, field })
        }
    }
}

/// Byte offset at which `layer` starts in `message`.
pub fn field_start(
    message: &[u8],
    msg_type: MessageType,
    layer: Option<Field>,
) -> Result<usize, FieldError> {
    skip_delimiters(message, position(msg_type, layer)?)
}

/// Byte offset of `field` in a message of type `msg_type`.
pub fn locate_field(message: &str, msg_type: MessageType, field: Field) -> Result<usize, FieldError> {
    field_start(message.as_bytes(), msg_type, Some(field))
}

/// Bytes from `start` up to the next delimiter or the end of the buffer.
pub fn span_to_delimiter(bytes: &[u8], start: usize) -> usize {
    bytes
        .get(start..)
        .map(|tail| tail.iter().position(|b| *b == DELIMITER).unwrap_or(tail.len()))
        .unwrap_or(0)
}
