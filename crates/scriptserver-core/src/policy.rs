//! Per-line behaviour policy decoded from a `token|token` string.

use crate::error::PolicyError;

bitflags::bitflags! {
    /// Composite policy flags controlling receive/send suppression and failure tolerance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Policy: u8 {
        /// Discard mismatching datagrams and keep waiting.
        const NOMATCH_DROP = 1 << 1;
        /// Do not wait for a response.
        const NORECV = 1 << 2;
        /// Do not send the outbound template.
        const NOSEND = 1 << 3;
        /// Absence of a response is the expected outcome; a match is a failure.
        const FAILPASS = 1 << 4;
        /// Set when the policy string could not be decoded.
        const UNKNOWN = 1 << 5;
        /// Wait silently; a timeout is not an error.
        const WAIT = 1 << 6;
        /// Log a timeout as a failure but keep running the script.
        const FAILCONTINUE = 1 << 7;
    }
}

const POLICY_TOKENS: &[(&str, Policy)] = &[
    ("nomatchdrop", Policy::NOMATCH_DROP),
    ("drop", Policy::NOMATCH_DROP),
    ("norecv", Policy::NORECV),
    ("nosend", Policy::NOSEND),
    ("failpass", Policy::FAILPASS),
    ("wait", Policy::WAIT),
    ("failcontinue", Policy::FAILCONTINUE),
];

impl Policy {
    /// Decode a `|`-separated token string. An empty string is the empty policy.
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        let mut flags = Policy::empty();
        let mut rest = s.trim();

        while !rest.is_empty() {
            let (token, tail) = match rest.split_once('|') {
                Some((token, tail)) => (token, tail),
                None => (rest, ""),
            };
            let flag = POLICY_TOKENS
                .iter()
                .find(|(name, _)| *name == token.trim())
                .map(|(_, flag)| *flag)
                .ok_or_else(|| PolicyError::Unrecognized {
                    remainder: rest.to_string(),
                    partial: flags | Policy::UNKNOWN,
                })?;
            flags |= flag;
            rest = tail;
        }

        Ok(flags)
    }

    /// Whether a mismatching datagram is dropped instead of failing the line.
    pub fn tolerates_mismatch(self) -> bool {
        self.intersects(
            Policy::NOMATCH_DROP | Policy::WAIT | Policy::FAILPASS | Policy::FAILCONTINUE,
        )
    }

    /// Whether a receive timeout lets the line proceed without data.
    pub fn tolerates_timeout(self) -> bool {
        self.intersects(Policy::WAIT | Policy::FAILPASS | Policy::FAILCONTINUE)
    }
}
