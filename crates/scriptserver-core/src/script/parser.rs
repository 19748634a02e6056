use tracing::{debug, info};

use super::{CopyRule, Expectation, LoopSpec, ScriptLineParams, StoreRule};
use crate::constants::{Field, MessageType, Operator};
use crate::context::ScriptContext;
use crate::error::{ExpandError, ParseError};
use crate::policy::Policy;
use crate::store::{Rounding, Transform, parse_hex};

const EXPECTATION_FIELDS: usize = 13;
const STORE_FIELDS: usize = 5;
const COPY_FIELDS: usize = 6;

/// Parse one script line.
///
/// ```text
/// desc:node:type:timeout:policy:loop[:exp]*,[store[:store]*],[copy[:copy]*],template
/// ```
///
/// Placeholders in the loop spec, in offset/size expressions and in the
/// expected data are expanded here, against the current store.
pub fn parse_line(line: &str, ctx: &ScriptContext) -> Result<ScriptLineParams, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let (head, rest) = line.split_once(',').unwrap_or((line, ""));
    let (stores, rest) = rest.split_once(',').unwrap_or((rest, ""));
    let (copies, template) = rest.split_once(',').unwrap_or((rest, ""));

    let mut header = head.split(':');
    let description = header.next().unwrap_or_default().to_uppercase();
    info!(description = %description, "message description");

    let node_name = header
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ParseError::MissingField("node"))?;
    let node = ctx
        .nodes
        .get(node_name)
        .cloned()
        .ok_or_else(|| ParseError::UnknownNode(node_name.to_string()))?;

    let msg_type = match header.next().map(str::trim).unwrap_or_default() {
        "" => None,
        token => Some(parse_message_type(token)?),
    };
    let timeout = parse_decimal(header.next().unwrap_or_default(), "timeout")? as u64;
    let policy = Policy::parse(header.next().unwrap_or_default())?;
    let loop_spec = LoopSpec::parse(&ctx.expand(header.next().unwrap_or_default())?);
    debug!(host = %node.host, timeout, ?policy, ?loop_spec, "line options");

    let expectations = header
        .filter(|record| !record.is_empty())
        .map(|record| parse_expectation(record, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    let stores = stores
        .split(':')
        .filter(|record| !record.is_empty())
        .map(parse_store)
        .collect::<Result<Vec<_>, _>>()?;
    let copies = copies
        .split(':')
        .filter(|record| !record.is_empty())
        .map(parse_copy)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ScriptLineParams {
        description,
        node_name: node_name.to_string(),
        node,
        msg_type,
        timeout,
        policy,
        loop_spec,
        expectations,
        stores,
        copies,
        template: template.to_string(),
    })
}

fn split_record<'a>(
    record: &'a str,
    name: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, ParseError> {
    let fields: Vec<&str> = record.splitn(expected, '|').collect();
    if fields.len() != expected {
        return Err(ParseError::FieldCount {
            record: name,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_expectation(record: &str, ctx: &ScriptContext) -> Result<Expectation, ParseError> {
    let f = split_record(record, "expectation", EXPECTATION_FIELDS)?;

    let op = Operator::from_token(f[0].trim())
        .ok_or_else(|| ParseError::UnknownOperator(f[0].to_string()))?;
    let type_check = parse_flag(f[1], "typecheck")?;
    let bit_check = parse_flag(f[2], "bitcheck")?;
    let reverse = parse_flag(f[3], "reversecheck")?;
    let stored_ref = non_empty(f[4]);
    let src_layer = parse_layer(f[5])?;
    let src_offset = parse_decimal(f[6], "source offset")?;
    let src_size = parse_decimal(f[7], "source size")?;
    let msg_type = match f[8].trim() {
        "" => return Err(ParseError::MissingField("expected message type")),
        token => parse_message_type(token)?,
    };
    let layer = parse_layer(f[9])?;
    let offset = parse_offset_expression(f[10], "offset", ctx)?;
    let size = parse_offset_expression(f[11], "size", ctx)?;

    let mut data = f[12].to_string();
    if let Some(key) = &stored_ref {
        data = stored_compare(key, size, &data, ctx)?;
    }
    let mut data = ctx.expand(&data)?;
    if reverse {
        data = reverse_byte_groups(&data);
    }
    debug!(?op, %msg_type, ?layer, offset, size, data = %data, "expectation");

    Ok(Expectation {
        op,
        type_check,
        bit_check,
        reverse,
        stored_ref,
        src_layer,
        src_offset,
        src_size,
        msg_type,
        layer,
        offset,
        size,
        data,
    })
}

fn parse_store(record: &str) -> Result<StoreRule, ParseError> {
    let f = split_record(record, "store", STORE_FIELDS)?;
    let transform = match f[1].trim() {
        "" => None,
        text => Some(Transform::parse(text)?),
    };
    Ok(StoreRule {
        key: non_empty(f[0]),
        transform,
        size: parse_decimal(f[2], "store size")?,
        src_layer: parse_layer(f[3])?,
        src_offset: parse_decimal(f[4], "store offset")?,
    })
}

fn parse_copy(record: &str) -> Result<CopyRule, ParseError> {
    let f = split_record(record, "copy", COPY_FIELDS)?;
    Ok(CopyRule {
        key: non_empty(f[0]),
        size: parse_decimal(f[1], "copy size")?,
        src_layer: parse_layer(f[2])?,
        src_offset: parse_decimal(f[3], "copy source offset")?,
        dst_layer: parse_layer(f[4])?,
        dst_offset: parse_decimal(f[5], "copy destination offset")?,
    })
}

/// Parse an offset or size: a decimal literal, or `{PLACEHOLDER params}` with
/// an optional `+N`, written either inside or after the braces. The expansion
/// is read as a decimal number.
pub fn parse_offset_expression(
    text: &str,
    what: &'static str,
    ctx: &ScriptContext,
) -> Result<usize, ParseError> {
    let text = text.trim();
    let Some(body) = text.strip_prefix('{') else {
        return parse_decimal(text, what);
    };
    let (inner, after) = body
        .split_once('}')
        .ok_or_else(|| ExpandError::Unterminated(text.to_string()))?;

    let (placeholder, constant) = match after.trim().strip_prefix('+') {
        Some(n) => (inner, parse_decimal(n, what)?),
        None => match inner.rsplit_once('+') {
            Some((head, n)) => (head, parse_decimal(n, what)?),
            None => (inner, 0),
        },
    };

    let expanded = ctx.expand(&format!("{{{}}}", placeholder.trim()))?;
    let digits: String = expanded
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits
        .parse::<usize>()
        .ok()
        .and_then(|value| value.checked_add(constant))
        .ok_or_else(|| ParseError::InvalidNumber {
            what,
            value: expanded,
        })
}

/// Expected data derived from a stored value: its first `size` characters,
/// optionally transformed by `<op><hex>` and re-encoded as zero-padded
/// uppercase hex.
fn stored_compare(
    key: &str,
    size: usize,
    transform: &str,
    ctx: &ScriptContext,
) -> Result<String, ParseError> {
    let stored = ctx
        .store
        .get(key)
        .ok_or_else(|| ParseError::UndefinedReference(key.to_string()))?;
    info!(key, value = stored, "loaded saved content for compare");
    let truncated = stored.get(..size).unwrap_or(stored);

    if transform.trim().is_empty() {
        return Ok(truncated.to_string());
    }
    let transform = Transform::parse(transform)?;
    let result = transform.apply(parse_hex(truncated)?, Rounding::Floor)?;
    Ok(format!("{result:0>size$X}"))
}

/// Reverse the order of two-character groups: `0A1B2C` becomes `2C1B0A`.
fn reverse_byte_groups(data: &str) -> String {
    let bytes = data.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let pairs = bytes.len() / 2;
    for i in (0..pairs).rev() {
        out.extend_from_slice(&bytes[i * 2..i * 2 + 2]);
    }
    out.extend_from_slice(&bytes[pairs * 2..]);
    String::from_utf8_lossy(&out).into_owned()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_decimal(s: &str, what: &'static str) -> Result<usize, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse().map_err(|_| ParseError::InvalidNumber {
        what,
        value: s.to_string(),
    })
}

fn parse_flag(s: &str, what: &'static str) -> Result<bool, ParseError> {
    parse_decimal(s, what).map(|v| v != 0)
}

fn parse_layer(s: &str) -> Result<Option<Field>, ParseError> {
    match s.trim() {
        "" => Ok(None),
        token => Field::from_token(token)
            .map(Some)
            .ok_or_else(|| ParseError::UnknownLayer(token.to_string())),
    }
}

fn parse_message_type(token: &str) -> Result<MessageType, ParseError> {
    MessageType::from_token(token).ok_or_else(|| ParseError::UnknownMessageType(token.to_string()))
}
