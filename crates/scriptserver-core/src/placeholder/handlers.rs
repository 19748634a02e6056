use tracing::{info, warn};

use super::Operand;
use crate::constants::TAI_EPOCH_OFFSET;
use crate::context::ScriptContext;
use crate::error::ExpandError;
use crate::store::parse_hex;

/// Loop index as two zero-padded lowercase hex digits.
pub fn encode_loop_index(index: u32) -> String {
    format!("{index:02x}")
}

/// Extended loop index: one byte below 0x80, otherwise a low byte with the
/// continuation bit set followed by the remaining high bits.
pub fn encode_loop_index_ext(index: u32) -> String {
    if index < 0x80 {
        format!("{:02x}", index << 1)
    } else {
        format!(
            "{:02x} {:02x}",
            ((index << 1) | 0x01) & 0xFF,
            (index >> 7) & 0xFF
        )
    }
}

fn pop_int(stack: &mut Vec<Operand>, command: &'static str) -> Result<u64, ExpandError> {
    match stack.pop() {
        Some(Operand::Int { value, .. }) => Ok(value),
        Some(Operand::Text(token)) => Err(ExpandError::NotInteger { command, token }),
        None => Err(ExpandError::MissingOperand { command }),
    }
}

pub(super) fn tai_offset(stack: &mut Vec<Operand>, ctx: &ScriptContext) -> Result<String, ExpandError> {
    let offset = pop_int(stack, "TAIOFFSET")? as i64;
    let tai = ctx.now_secs() + TAI_EPOCH_OFFSET + offset + ctx.desync.average();
    Ok(format!("{tai:x}"))
}

pub(super) fn load(stack: &mut Vec<Operand>, ctx: &ScriptContext) -> Result<String, ExpandError> {
    let offset = if stack.len() >= 2 {
        pop_int(stack, "LOAD")?
    } else {
        0
    };
    let name = stack
        .pop()
        .ok_or(ExpandError::MissingOperand { command: "LOAD" })?;
    let name = name.as_text();

    let Some(stored) = ctx.store.get(name) else {
        warn!(name, "LOAD: reference to undefined variable");
        return Err(ExpandError::UndefinedVariable(name.to_string()));
    };
    let value = parse_hex(stored).map_err(|_| ExpandError::NotHex {
        key: name.to_string(),
        value: stored.to_string(),
    })?;
    let loaded = value
        .checked_add(offset)
        .ok_or(ExpandError::Overflow { command: "LOAD" })?;
    let text = format!("{loaded:x}");
    info!(name, loaded = %text, "loaded stored value");
    Ok(text)
}

pub(super) fn config(command: &str, ctx: &ScriptContext) -> Result<String, ExpandError> {
    ctx.export(command)
        .map(str::to_string)
        .ok_or_else(|| ExpandError::MissingExport(command.to_string()))
}
