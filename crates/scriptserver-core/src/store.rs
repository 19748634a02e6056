//! Run-wide key/value store and the arithmetic transforms applied to stored values.

use std::collections::HashMap;

use crate::error::TransformError;

/// Process-wide store of values saved from received messages.
///
/// Lives for the whole run and is never reset between script lines. A key
/// keeps its first value: later saves under the same key are ignored until
/// [`GlobalStore::clear`] is called.
#[derive(Debug, Default, Clone)]
pub struct GlobalStore {
    values: HashMap<String, String>,
}

impl GlobalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store `value` under `key` unless the key already holds a value.
    ///
    /// Returns `true` if the value was stored.
    pub fn insert_if_absent(&mut self, key: &str, value: String) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value);
        true
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// How [`ArithOp::Div`] treats a remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Floor,
    Ceil,
}

/// An `<operator><hex operand>` transform such as `+1`, `-A0` or `/10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    pub op: ArithOp,
    pub operand: u64,
}

impl Transform {
    pub fn parse(s: &str) -> Result<Self, TransformError> {
        let s = s.trim();
        let mut chars = s.chars();
        let op = match chars.next() {
            Some('+') => ArithOp::Add,
            Some('-') => ArithOp::Sub,
            Some('*') => ArithOp::Mul,
            Some('/') => ArithOp::Div,
            _ => return Err(TransformError::Invalid(s.to_string())),
        };
        let operand = parse_hex(chars.as_str()).map_err(|_| TransformError::Invalid(s.to_string()))?;
        Ok(Self { op, operand })
    }

    pub fn apply(&self, value: u64, rounding: Rounding) -> Result<u64, TransformError> {
        let overflow = || TransformError::Overflow(self.to_string());
        match self.op {
            ArithOp::Add => value.checked_add(self.operand).ok_or_else(overflow),
            ArithOp::Sub => value.checked_sub(self.operand).ok_or_else(overflow),
            ArithOp::Mul => value.checked_mul(self.operand).ok_or_else(overflow),
            ArithOp::Div => {
                if self.operand == 0 {
                    return Err(TransformError::DivisionByZero);
                }
                let q = value / self.operand;
                match rounding {
                    Rounding::Ceil if value % self.operand != 0 => Ok(q + 1),
                    _ => Ok(q),
                }
            }
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            ArithOp::Add => '+',
            ArithOp::Sub => '-',
            ArithOp::Mul => '*',
            ArithOp::Div => '/',
        };
        write!(f, "{op}{:X}", self.operand)
    }
}

/// Parse a whole string as a hexadecimal number.
pub fn parse_hex(s: &str) -> Result<u64, TransformError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TransformError::NotHex(s.to_string()));
    }
    u64::from_str_radix(s, 16).map_err(|_| TransformError::NotHex(s.to_string()))
}
