//! Cross-message field copy into outbound templates, and field saves into the
//! run-wide store.

use tracing::{debug, info, warn};

use crate::constants::MessageType;
use crate::context::ScriptContext;
use crate::error::CopyError;
use crate::field::{field_start, span_to_delimiter};
use crate::script::{CopyRule, StoreRule};
use crate::store::{Rounding, parse_hex};

/// Copy fields from `inbound` (or from stored values) into `template`.
///
/// `template` is the outbound message of type `template_type`. The buffer
/// grows when a copied value does not fit in its destination field; bytes
/// after the destination field are shifted, never overwritten.
pub fn apply_copies(
    rules: &[CopyRule],
    inbound: Option<&str>,
    template: &mut Vec<u8>,
    template_type: Option<MessageType>,
    ctx: &ScriptContext,
) -> Result<(), CopyError> {
    for rule in rules {
        let (source, source_type) = match &rule.key {
            Some(key) => {
                let Some(stored) = ctx.store.get(key) else {
                    warn!(key, "copy: undefined reference to stored id, skipping");
                    continue;
                };
                info!(key, value = stored, "loading saved content");
                (stored, inbound.and_then(MessageType::of_message))
            }
            None => {
                let message = inbound.ok_or(CopyError::NoSource)?;
                (message, MessageType::of_message(message))
            }
        };
        let source = source.as_bytes();

        let src_field = match source_type {
            Some(t) => field_start(source, t, rule.src_layer).map_err(CopyError::Source)?,
            // A stored value without a typed message is a bare field.
            None if rule.key.is_some() => 0,
            None => return Err(CopyError::NoSource),
        };
        let dst_type = template_type.ok_or(CopyError::NoDestinationType)?;
        let dst_field = field_start(template, dst_type, rule.dst_layer).map_err(CopyError::Destination)?;

        let src_start = src_field
            .checked_add(rule.src_offset)
            .filter(|start| *start <= source.len())
            .ok_or(CopyError::SourceOffset { offset: rule.src_offset })?;
        let available = span_to_delimiter(source, src_start);
        let copy_len = rule.size.min(available);
        if copy_len < rule.size {
            info!(
                copy_len,
                requested = rule.size,
                "copy truncated at delimiter"
            );
        }

        let dst_start = dst_field
            .checked_add(rule.dst_offset)
            .filter(|start| *start <= template.len())
            .ok_or(CopyError::DestinationOffset { offset: rule.dst_offset })?;
        let space = span_to_delimiter(template, dst_start);
        if space < copy_len {
            let extra = copy_len - space;
            info!(space, needed = copy_len, "destination too short, growing template");
            let at = dst_start + space;
            template.splice(at..at, std::iter::repeat_n(b' ', extra));
        }

        template[dst_start..dst_start + copy_len]
            .copy_from_slice(&source[src_start..src_start + copy_len]);
        debug!(
            copied = %String::from_utf8_lossy(&template[dst_start..dst_start + copy_len]),
            src_offset = rule.src_offset,
            dst_offset = rule.dst_offset,
            "copy applied"
        );
    }
    Ok(())
}

/// Save fields of `inbound` into the store. A key that already holds a value
/// is left untouched.
pub fn apply_stores(
    rules: &[StoreRule],
    inbound: Option<&str>,
    ctx: &mut ScriptContext,
) -> Result<(), CopyError> {
    for rule in rules {
        let Some(key) = rule.key.as_deref() else {
            debug!("store rule without id, skipping");
            continue;
        };
        let Some(message) = inbound else {
            warn!(key, "nothing received to store, skipping");
            continue;
        };
        if ctx.store.contains(key) {
            debug!(key, "already stored, keeping first value");
            continue;
        }

        let content = if rule.size == 0 {
            message.to_string()
        } else {
            let bytes = message.as_bytes();
            let start = MessageType::of_message(message)
                .ok_or(())
                .and_then(|t| field_start(bytes, t, rule.src_layer).map_err(|_| ()))
                .and_then(|field| field.checked_add(rule.src_offset).ok_or(()));
            let Ok(start) = start else {
                warn!(key, "store source field not found, skipping");
                continue;
            };
            let span = start.checked_add(rule.size).and_then(|end| bytes.get(start..end));
            let Some(slice) = span else {
                warn!(key, start, size = rule.size, "store span out of range, skipping");
                continue;
            };
            String::from_utf8_lossy(slice).into_owned()
        };

        let value = match &rule.transform {
            Some(transform) => {
                let result = transform.apply(parse_hex(&content)?, Rounding::Ceil)?;
                format!("{result:X}")
            }
            None => content,
        };
        info!(key, value = %value, "save content");
        ctx.store.insert_if_absent(key, value);
    }
    Ok(())
}
