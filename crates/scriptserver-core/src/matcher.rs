//! Evaluation of one expectation against a received message.

use tracing::{debug, info};

use crate::constants::{DELIMITER, MessageType, Operator};
use crate::context::ScriptContext;
use crate::field::field_start;
use crate::policy::Policy;
use crate::script::Expectation;

/// Widest operand, in characters, accepted by the relational operators.
pub const MAX_RELATIONAL_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Ok,
    Failed,
    /// Discard the datagram and keep waiting.
    Drop,
}

fn mismatch(policy: Policy) -> MatchOutcome {
    if policy.tolerates_mismatch() {
        info!("response dropped");
        MatchOutcome::Drop
    } else {
        MatchOutcome::Failed
    }
}

/// Evaluate `expectation` against `message` under `policy`.
pub fn evaluate(
    message: &str,
    expectation: &Expectation,
    policy: Policy,
    ctx: &ScriptContext,
) -> MatchOutcome {
    if MessageType::of_message(message) != Some(expectation.msg_type) {
        if !policy.tolerates_mismatch() {
            info!(expected = %expectation.msg_type, "unexpected message type");
        }
        return mismatch(policy);
    }

    let start = match field_start(message.as_bytes(), expectation.msg_type, expectation.layer) {
        Ok(start) => start,
        Err(err) => {
            info!(%err, message, "cannot locate field");
            return MatchOutcome::Failed;
        }
    };

    let expanded = match ctx.expand(&message[start..]) {
        Ok(text) => text,
        Err(err) => {
            info!(%err, "expansion of received field failed");
            return MatchOutcome::Failed;
        }
    };

    match expectation.op {
        Operator::Eq if expectation.bit_check => match_bits(&expanded, expectation, policy),
        Operator::Eq => match_literal(&expanded, expectation, policy),
        op => match_relational(&expanded, expectation, op),
    }
}

fn match_bits(field: &str, exp: &Expectation, policy: Policy) -> MatchOutcome {
    if exp.size != 1 {
        info!(size = exp.size, "bit compare only for a half byte");
        return MatchOutcome::Failed;
    }
    let received = field
        .as_bytes()
        .get(exp.offset)
        .and_then(|b| (*b as char).to_digit(16))
        .map(|nibble| format!("{nibble:04b}"));
    let expected = exp.data.get(..4);

    match (received, expected) {
        (Some(received), Some(expected)) if received == expected => {
            matched(policy, exp, &received)
        }
        (received, _) => {
            info!(
                offset = exp.offset,
                expected = %exp.data,
                received = received.as_deref().unwrap_or(""),
                "bit compare failed"
            );
            mismatch(policy)
        }
    }
}

fn match_literal(field: &str, exp: &Expectation, policy: Policy) -> MatchOutcome {
    let bytes = field.as_bytes();
    let Some(end) = exp.offset.checked_add(exp.size) else {
        info!(offset = exp.offset, size = exp.size, "compare span out of range");
        return mismatch(policy);
    };
    let received = bytes.get(exp.offset..end);
    let expected = exp.data.as_bytes().get(..exp.size);

    let Some(received) = received.filter(|r| Some(*r) == expected) else {
        info!(
            offset = exp.offset,
            expected = %exp.data,
            received = field.get(exp.offset..).unwrap_or(""),
            "response wait failed"
        );
        return mismatch(policy);
    };

    if exp.type_check && bytes.get(end).is_some_and(|b| *b != DELIMITER) {
        info!(size = exp.size, "value received beyond expected size");
        return mismatch(policy);
    }

    matched(policy, exp, &String::from_utf8_lossy(received))
}

fn matched(policy: Policy, exp: &Expectation, received: &str) -> MatchOutcome {
    if policy.contains(Policy::FAILPASS) {
        info!(offset = exp.offset, expected = %exp.data, received, "wait not ok: matched under failpass");
        MatchOutcome::Failed
    } else {
        info!(offset = exp.offset, expected = %exp.data, received, "wait ok");
        MatchOutcome::Ok
    }
}

/// Leading hex digits of at most `width` characters of `text`. An empty
/// span reads as 0.
fn leading_hex(text: &str, width: usize) -> Option<u64> {
    if width == 0 {
        return Some(0);
    }
    let digits: String = text
        .chars()
        .take(width)
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u64::from_str_radix(&digits, 16).ok()
}

fn match_relational(field: &str, exp: &Expectation, op: Operator) -> MatchOutcome {
    if exp.size > MAX_RELATIONAL_WIDTH {
        info!(size = exp.size, "unable to compare data larger than 4 characters");
        return MatchOutcome::Failed;
    }
    let lhs = field.get(exp.offset..).and_then(|s| leading_hex(s, exp.size));
    let rhs = leading_hex(&exp.data, exp.size);
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        info!(expected = %exp.data, "relational operand is not hex");
        return MatchOutcome::Failed;
    };

    if op.holds(lhs, rhs) {
        debug!(lhs, rhs, "compare ok");
        MatchOutcome::Ok
    } else {
        info!(lhs, rhs, "compare failed");
        MatchOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::Field;

    fn exp(op: Operator, offset: usize, size: usize, data: &str) -> Expectation {
        Expectation {
            op,
            type_check: false,
            bit_check: false,
            reverse: false,
            stored_ref: None,
            src_layer: None,
            src_offset: 0,
            src_size: 0,
            msg_type: MessageType::RxRf,
            layer: Some(Field::App),
            offset,
            size,
            data: data.to_string(),
        }
    }

    const MSG: &str = "RX_RF,3,0A1B2C,TL,NL,DLL";

    #[test]
    fn literal_match_is_ok() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, 2, 2, "1B");
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Ok);
    }

    #[test]
    fn failpass_inverts_a_match() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, 0, 6, "0A1B2C");
        assert_eq!(evaluate(MSG, &e, Policy::FAILPASS, &ctx), MatchOutcome::Failed);
    }

    #[test]
    fn literal_mismatch_depends_on_policy() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, 0, 2, "FF");
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
        assert_eq!(evaluate(MSG, &e, Policy::NOMATCH_DROP, &ctx), MatchOutcome::Drop);
        assert_eq!(evaluate(MSG, &e, Policy::FAILPASS, &ctx), MatchOutcome::Drop);
    }

    #[test]
    fn wrong_type_depends_on_policy() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, 0, 2, "0A");
        let cfg = "RX_CFG,1,0A";
        assert_eq!(evaluate(cfg, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
        assert_eq!(evaluate(cfg, &e, Policy::WAIT, &ctx), MatchOutcome::Drop);
    }

    #[test]
    fn type_check_rejects_longer_field() {
        let ctx = ScriptContext::default();
        let mut e = exp(Operator::Eq, 0, 4, "0A1B");
        e.type_check = true;
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
        e.size = 6;
        e.data = "0A1B2C".into();
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Ok);
    }

    #[test]
    fn type_check_accepts_end_of_message() {
        let ctx = ScriptContext::default();
        let mut e = exp(Operator::Eq, 0, 3, "DLL");
        e.layer = Some(Field::Dll);
        e.type_check = true;
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Ok);
    }

    #[test]
    fn out_of_range_span_is_a_mismatch() {
        let ctx = ScriptContext::default();
        let mut e = exp(Operator::Eq, 2, 8, "DLLDLLDL");
        e.layer = Some(Field::Dll);
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
    }

    #[test]
    fn unlocatable_field_fails_even_with_drop() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, 0, 2, "0A");
        assert_eq!(evaluate("RX_RF,1", &e, Policy::NOMATCH_DROP, &ctx), MatchOutcome::Failed);
    }

    #[test]
    fn bit_check_compares_nibble() {
        let ctx = ScriptContext::default();
        let mut e = exp(Operator::Eq, 1, 1, "1010");
        e.bit_check = true;
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Ok);
        e.data = "1011".into();
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
        e.size = 2;
        assert_eq!(evaluate(MSG, &e, Policy::NOMATCH_DROP, &ctx), MatchOutcome::Failed);
    }

    #[test]
    fn relational_operators() {
        let ctx = ScriptContext::default();
        assert_eq!(
            evaluate(MSG, &exp(Operator::Lt, 0, 2, "0B"), Policy::empty(), &ctx),
            MatchOutcome::Ok
        );
        assert_eq!(
            evaluate(MSG, &exp(Operator::Ge, 0, 2, "0B"), Policy::empty(), &ctx),
            MatchOutcome::Failed
        );
        assert_eq!(
            evaluate(MSG, &exp(Operator::Le, 0, 4, "0A1B"), Policy::empty(), &ctx),
            MatchOutcome::Ok
        );
    }

    #[test]
    fn relational_rejects_wide_operands() {
        let ctx = ScriptContext::default();
        assert_eq!(
            evaluate(MSG, &exp(Operator::Gt, 0, 5, "00000"), Policy::NOMATCH_DROP, &ctx),
            MatchOutcome::Failed
        );
    }

    #[test]
    fn partial_multibyte_match_does_not_split_the_text() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, 0, 1, "é");
        assert_eq!(evaluate("RX_RF,1,é,x", &e, Policy::empty(), &ctx), MatchOutcome::Ok);
        assert_eq!(evaluate("RX_RF,1,é,x", &e, Policy::FAILPASS, &ctx), MatchOutcome::Failed);
    }

    #[test]
    fn overflowing_span_is_a_mismatch() {
        let ctx = ScriptContext::default();
        let e = exp(Operator::Eq, usize::MAX, 2, "0A");
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
        assert_eq!(evaluate(MSG, &e, Policy::NOMATCH_DROP, &ctx), MatchOutcome::Drop);
        let e = exp(Operator::Lt, usize::MAX, 2, "0A");
        assert_eq!(evaluate(MSG, &e, Policy::empty(), &ctx), MatchOutcome::Failed);
    }

    #[test]
    fn empty_relational_span_reads_as_zero() {
        let ctx = ScriptContext::default();
        for op in [Operator::Le, Operator::Ge] {
            let outcome = evaluate(MSG, &exp(op, 0, 0, "FF"), Policy::empty(), &ctx);
            assert_eq!(outcome, MatchOutcome::Ok, "{op:?}");
        }
        assert_eq!(
            evaluate(MSG, &exp(Operator::Gt, 0, 0, ""), Policy::empty(), &ctx),
            MatchOutcome::Failed
        );
    }

    #[test]
    fn received_field_is_expanded() {
        let mut ctx = ScriptContext::default();
        ctx.loop_index = 0x2c;
        let e = exp(Operator::Eq, 0, 2, "2c");
        assert_eq!(evaluate("RX_RF,1,{DIDX},x", &e, Policy::empty(), &ctx), MatchOutcome::Ok);
        assert_eq!(
            evaluate("RX_RF,1,{NOPE},x", &e, Policy::NOMATCH_DROP, &ctx),
            MatchOutcome::Failed
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::constants::Field;
    use proptest::prelude::*;

    fn relational(op: Operator, size: usize, data: String) -> Expectation {
        Expectation {
            op,
            type_check: false,
            bit_check: false,
            reverse: false,
            stored_ref: None,
            src_layer: None,
            src_offset: 0,
            src_size: 0,
            msg_type: MessageType::RxCfg,
            layer: Some(Field::App),
            offset: 0,
            size,
            data,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn less_than_agrees_with_numeric_order(a in 0u64..=0xFFFF, b in 0u64..=0xFFFF) {
            let ctx = ScriptContext::default();
            let msg = format!("RX_CFG,1,{a:04X}");
            let e = relational(Operator::Lt, 4, format!("{b:04X}"));
            let expected = if a < b { MatchOutcome::Ok } else { MatchOutcome::Failed };
            prop_assert_eq!(evaluate(&msg, &e, Policy::empty(), &ctx), expected);
        }

        #[test]
        fn wide_operands_always_fail(width in 5usize..12, policy_bits in 0u8..=255) {
            let ctx = ScriptContext::default();
            let digits = "1".repeat(width);
            let msg = format!("RX_CFG,1,{digits}");
            let e = relational(Operator::Lt, width, digits.replace('1', "2"));
            let policy = Policy::from_bits_truncate(policy_bits);
            prop_assert_eq!(evaluate(&msg, &e, policy, &ctx), MatchOutcome::Failed);
        }
    }
}
