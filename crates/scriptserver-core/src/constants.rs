//! Message types, field names, and comparison operators used by scripts.

use std::fmt;

/// Field delimiter of the flat textual wire format.
pub const DELIMITER: u8 = b',';

/// Seconds added to the Unix clock to obtain the device time base.
pub const TAI_EPOCH_OFFSET: i64 = 0x1692_5E80 + 34;

/// Number of delimiters preceding the TAI seconds in an `RX_RF` datagram.
pub const TAI_FIELD_POSITION: usize = 8;

/// Number of desynchronization samples kept for outgoing time correction.
pub const DESYNC_HISTORY_LEN: usize = 3;

/// Message types known to the backbone router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    RxErr,
    RxCfg,
    RxRf,
    RxRsp,
    TxErr,
    TxCfg,
    TxRf,
    TxRsp,
    RxDllCfm,
    RxRecvDllAck,
    RxSentDllAck,
}

impl MessageType {
    pub const ALL: [MessageType; 11] = [
        MessageType::RxErr,
        MessageType::RxCfg,
        MessageType::RxRf,
        MessageType::RxRsp,
        MessageType::TxErr,
        MessageType::TxCfg,
        MessageType::TxRf,
        MessageType::TxRsp,
        MessageType::RxDllCfm,
        MessageType::RxRecvDllAck,
        MessageType::RxSentDllAck,
    ];

    pub fn token(self) -> &'static str {
        match self {
            MessageType::RxErr => "RX_ERR",
            MessageType::RxCfg => "RX_CFG",
            MessageType::RxRf => "RX_RF",
            MessageType::RxRsp => "RX_RSP",
            MessageType::TxErr => "TX_ERR",
            MessageType::TxCfg => "TX_CFG",
            MessageType::TxRf => "TX_RF",
            MessageType::TxRsp => "TX_RSP",
            MessageType::RxDllCfm => "RX_DLL_CFM",
            MessageType::RxRecvDllAck => "RX_RECV_DLL_ACK",
            MessageType::RxSentDllAck => "RX_SENT_DLL_ACK",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.token() == token)
    }

    /// Type of a flat message, read from its first delimited field.
    pub fn of_message(message: &str) -> Option<Self> {
        let first = message.split(DELIMITER as char).next()?;
        Self::from_token(first.trim())
    }

    /// Outbound types carry a send-time timestamp suffix.
    pub fn is_outbound(self) -> bool {
        matches!(
            self,
            MessageType::TxRf | MessageType::TxCfg | MessageType::TxRsp
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Named field groups (layers) that may appear in a message layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    App,
    Tl,
    Nl,
    Dll,
    OrigApp,
    OrigTl,
    OrigNl,
    OrigDll,
    Ipv6SrcAddr,
    Ipv6DstAddr,
    Ipv6SrcPort,
    Ipv6DstPort,
    ContractId,
    UdpCompression,
    TlEncrypt,
    Priority,
    Ecn,
}

impl Field {
    pub const ALL: [Field; 17] = [
        Field::App,
        Field::Tl,
        Field::Nl,
        Field::Dll,
        Field::OrigApp,
        Field::OrigTl,
        Field::OrigNl,
        Field::OrigDll,
        Field::Ipv6SrcAddr,
        Field::Ipv6DstAddr,
        Field::Ipv6SrcPort,
        Field::Ipv6DstPort,
        Field::ContractId,
        Field::UdpCompression,
        Field::TlEncrypt,
        Field::Priority,
        Field::Ecn,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Field::App => "APP",
            Field::Tl => "TL",
            Field::Nl => "NL",
            Field::Dll => "DLL",
            Field::OrigApp => "OrigAPP",
            Field::OrigTl => "OrigTL",
            Field::OrigNl => "OrigNL",
            Field::OrigDll => "OrigDLL",
            Field::Ipv6SrcAddr => "IPv6SrcAddr",
            Field::Ipv6DstAddr => "IPv6DstAddr",
            Field::Ipv6SrcPort => "IPv6SrcPort",
            Field::Ipv6DstPort => "IPv6DstPort",
            Field::ContractId => "ContractID",
            Field::UdpCompression => "UDPCompression",
            Field::TlEncrypt => "TLEncrypt",
            Field::Priority => "Priority",
            Field::Ecn => "ECN",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.token() == token)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Comparison applied by an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Operator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "lt" => Some(Operator::Lt),
            "le" => Some(Operator::Le),
            "gt" => Some(Operator::Gt),
            "ge" => Some(Operator::Ge),
            "eq" => Some(Operator::Eq),
            _ => None,
        }
    }

    pub fn holds(self, lhs: u64, rhs: u64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_tokens_roundtrip() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::from_token(t.token()), Some(t));
        }
        assert_eq!(MessageType::from_token("RX_NOPE"), None);
    }

    #[test]
    fn message_type_of_message_reads_first_field() {
        assert_eq!(
            MessageType::of_message("RX_RF,12,0102,TL"),
            Some(MessageType::RxRf)
        );
        assert_eq!(
            MessageType::of_message("RX_RSP,1"),
            Some(MessageType::RxRsp)
        );
        assert_eq!(MessageType::of_message("garbage,1"), None);
        assert_eq!(MessageType::of_message(""), None);
    }

    #[test]
    fn outbound_types() {
        assert!(MessageType::TxRf.is_outbound());
        assert!(MessageType::TxCfg.is_outbound());
        assert!(MessageType::TxRsp.is_outbound());
        assert!(!MessageType::TxErr.is_outbound());
        assert!(!MessageType::RxRf.is_outbound());
    }

    #[test]
    fn field_tokens_are_exact() {
        for f in Field::ALL {
            assert_eq!(Field::from_token(f.token()), Some(f));
        }
        assert_eq!(Field::from_token("app"), None);
        assert_eq!(Field::from_token("APPX"), None);
    }

    #[test]
    fn operator_relations() {
        assert!(Operator::Lt.holds(1, 2));
        assert!(!Operator::Lt.holds(2, 2));
        assert!(Operator::Le.holds(2, 2));
        assert!(Operator::Gt.holds(3, 2));
        assert!(Operator::Ge.holds(2, 2));
        assert_eq!(Operator::from_token("ne"), None);
    }
}
