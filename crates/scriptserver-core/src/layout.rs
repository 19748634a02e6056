//! Static layout catalog: the ordered field slots of every message type.
//!
//! A field's position in its type's layout equals the number of `,`
//! delimiters that precede its data in a flat message. Unnamed slots (`None`)
//! hold the type token, message number and other fields scripts never address.

use crate::constants::{Field, MessageType};

/// One delimited slot of a layout.
pub type Slot = Option<Field>;

const TX_RF_LAYOUT: &[Slot] = &[
    None,
    None,
    Some(Field::App),
    Some(Field::TlEncrypt),
    Some(Field::Priority),
    None,
    Some(Field::Ecn),
    Some(Field::Ipv6SrcAddr),
    Some(Field::Ipv6DstAddr),
    Some(Field::Ipv6SrcPort),
    Some(Field::Ipv6DstPort),
    Some(Field::ContractId),
    Some(Field::UdpCompression),
    Some(Field::Nl),
    Some(Field::Tl),
    Some(Field::Dll),
];

const TX_RSP_LAYOUT: &[Slot] = &[
    None,
    None,
    Some(Field::App),
    Some(Field::TlEncrypt),
    Some(Field::Priority),
    None,
    Some(Field::Ecn),
    Some(Field::Ipv6SrcAddr),
    Some(Field::Ipv6DstAddr),
    Some(Field::Ipv6SrcPort),
    Some(Field::Ipv6DstPort),
    Some(Field::ContractId),
    Some(Field::UdpCompression),
    Some(Field::Nl),
    Some(Field::Tl),
    Some(Field::Dll),
    Some(Field::OrigApp),
    Some(Field::OrigTl),
    Some(Field::OrigNl),
    Some(Field::OrigDll),
];

const CFG_LAYOUT: &[Slot] = &[None, None, Some(Field::App)];

const RX_RF_LAYOUT: &[Slot] = &[
    None,
    None,
    Some(Field::App),
    Some(Field::Tl),
    Some(Field::Nl),
    Some(Field::Dll),
];

const RX_ERR_LAYOUT: &[Slot] = &[None, None, None, None, None, Some(Field::App)];

const RX_RECV_DLL_ACK_LAYOUT: &[Slot] = &[None, None, Some(Field::Dll)];

const RX_DLL_CFM_LAYOUT: &[Slot] = &[None, None, None, None, None, Some(Field::Dll)];

/// Layout of a message type. Types without addressable fields have an empty layout.
pub fn layout(msg_type: MessageType) -> &'static [Slot] {
    match msg_type {
        MessageType::TxRf => TX_RF_LAYOUT,
        MessageType::TxRsp => TX_RSP_LAYOUT,
        MessageType::TxCfg | MessageType::RxCfg => CFG_LAYOUT,
        MessageType::RxRf => RX_RF_LAYOUT,
        MessageType::RxErr => RX_ERR_LAYOUT,
        MessageType::RxRecvDllAck => RX_RECV_DLL_ACK_LAYOUT,
        MessageType::RxDllCfm => RX_DLL_CFM_LAYOUT,
        MessageType::RxRsp | MessageType::TxErr | MessageType::RxSentDllAck => &[],
    }
}

/// Zero-based position of `field` in the layout of `msg_type`.
///
/// `None` means the field does not exist for this type, which is an ordinary
/// outcome (a link-layer field on a config message, for example).
pub fn locate(msg_type: MessageType, field: Field) -> Option<usize> {
    layout(msg_type).iter().position(|slot| *slot == Some(field))
}
