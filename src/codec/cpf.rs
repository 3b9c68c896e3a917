//! Common Packet Format item lists carried by Send-RR-Data and
//! Send-Unit-Data encap commands.

use super::{Decoder, Encoder};
use crate::error::{PlcError, PlcResult};

pub const ITEM_NULL_ADDRESS: u16 = 0x0000;
pub const ITEM_CONNECTED_ADDRESS: u16 = 0x00A1;
pub const ITEM_CONNECTED_DATA: u16 = 0x00B1;
pub const ITEM_UNCONNECTED_DATA: u16 = 0x00B2;

/// One CPF item: address or data, carrying its own CIP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpfItem {
    NullAddress,
    ConnectedAddress { connection_id: u32 },
    ConnectedData { connection_sequence_number: u16, cip_data: Vec<u8> },
    UnconnectedData { cip_data: Vec<u8> },
}

impl CpfItem {
    fn item_type(&self) -> u16 {
        match self {
            CpfItem::NullAddress => ITEM_NULL_ADDRESS,
            CpfItem::ConnectedAddress { .. } => ITEM_CONNECTED_ADDRESS,
            CpfItem::ConnectedData { .. } => ITEM_CONNECTED_DATA,
            CpfItem::UnconnectedData { .. } => ITEM_UNCONNECTED_DATA,
        }
    }

    fn encode(&self, enc: &mut Encoder) {
        enc.u16(self.item_type());
        match self {
            CpfItem::NullAddress => {
                enc.u16(0);
            }
            CpfItem::ConnectedAddress { connection_id } => {
                enc.u16(4).u32(*connection_id);
            }
            CpfItem::ConnectedData { connection_sequence_number, cip_data } => {
                enc.u16((2 + cip_data.len()) as u16)
                    .u16(*connection_sequence_number)
                    .bytes(cip_data);
            }
            CpfItem::UnconnectedData { cip_data } => {
                enc.u16(cip_data.len() as u16).bytes(cip_data);
            }
        }
    }
}

/// A full CPF packet: `interface_handle=0, router_timeout_sec, items[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpfPacket {
    pub router_timeout_sec: u16,
    pub items: Vec<CpfItem>,
}

impl CpfPacket {
    pub fn unconnected(router_timeout_sec: u16, cip_data: Vec<u8>) -> Self {
        Self {
            router_timeout_sec,
            items: vec![CpfItem::NullAddress, CpfItem::UnconnectedData { cip_data }],
        }
    }

    pub fn connected(
        router_timeout_sec: u16,
        connection_id: u32,
        connection_sequence_number: u16,
        cip_data: Vec<u8>,
    ) -> Self {
        Self {
            router_timeout_sec,
            items: vec![
                CpfItem::ConnectedAddress { connection_id },
                CpfItem::ConnectedData { connection_sequence_number, cip_data },
            ],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.u32(0).u16(self.router_timeout_sec).u16(self.items.len() as u16);
        for item in &self.items {
            item.encode(&mut enc);
        }
        enc.into_vec()
    }

    pub fn decode(buf: &[u8]) -> PlcResult<Self> {
        let mut dec = Decoder::new(buf);
        let _interface_handle = dec.u32()?;
        let router_timeout_sec = dec.u16()?;
        let item_count = dec.u16()?;
        let mut items = Vec::with_capacity(item_count as usize);
        for _ in 0..item_count {
            let item_type = dec.u16()?;
            let length = dec.u16()? as usize;
            let body = dec.bytes(length)?;
            items.push(match item_type {
                ITEM_NULL_ADDRESS => CpfItem::NullAddress,
                ITEM_CONNECTED_ADDRESS => {
                    if length != 4 {
                        return Err(PlcError::BadData("connected-address item must be 4 bytes".into()));
                    }
                    let mut item_dec = Decoder::new(body);
                    CpfItem::ConnectedAddress { connection_id: item_dec.u32()? }
                }
                ITEM_CONNECTED_DATA => {
                    if length < 2 {
                        return Err(PlcError::BadData("connected-data item too short".into()));
                    }
                    let mut item_dec = Decoder::new(body);
                    let connection_sequence_number = item_dec.u16()?;
                    CpfItem::ConnectedData {
                        connection_sequence_number,
                        cip_data: item_dec.rest().to_vec(),
                    }
                }
                ITEM_UNCONNECTED_DATA => CpfItem::UnconnectedData { cip_data: body.to_vec() },
                other => {
                    return Err(PlcError::Unsupported(format!("unrecognized CPF item type 0x{other:04X}")))
                }
            });
        }
        Ok(Self { router_timeout_sec, items })
    }

    /// The CIP request/response body carried by this packet, regardless of
    /// connected or unconnected framing.
    pub fn cip_data(&self) -> PlcResult<&[u8]> {
        for item in &self.items {
            match item {
                CpfItem::UnconnectedData { cip_data } | CpfItem::ConnectedData { cip_data, .. } => {
                    return Ok(cip_data)
                }
                _ => {}
            }
        }
        Err(PlcError::BadData("CPF packet carries no data item".into()))
    }

    pub fn connection_id(&self) -> Option<u32> {
        self.items.iter().find_map(|i| match i {
            CpfItem::ConnectedAddress { connection_id } => Some(*connection_id),
            _ => None,
        })
    }

    pub fn connection_sequence_number(&self) -> Option<u16> {
        self.items.iter().find_map(|i| match i {
            CpfItem::ConnectedData { connection_sequence_number, .. } => Some(*connection_sequence_number),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconnected_round_trip() {
        let pkt = CpfPacket::unconnected(5, vec![0x4C, 0x02, 1, 2, 3, 4]);
        let buf = pkt.encode();
        let decoded = CpfPacket::decode(&buf).unwrap();
        assert_eq!(decoded, pkt);
        assert_eq!(decoded.cip_data().unwrap(), &[0x4C, 0x02, 1, 2, 3, 4]);
    }

    #[test]
    fn connected_round_trip_carries_sequence_number() {
        let pkt = CpfPacket::connected(0, 0xDEAD_BEEF, 42, vec![0xCC, 0x00]);
        let buf = pkt.encode();
        let decoded = CpfPacket::decode(&buf).unwrap();
        assert_eq!(decoded.connection_id(), Some(0xDEAD_BEEF));
        assert_eq!(decoded.connection_sequence_number(), Some(42));
        assert_eq!(decoded.cip_data().unwrap(), &[0xCC, 0x00]);
    }

    #[test]
    fn unknown_item_type_is_unsupported() {
        let mut enc = Encoder::new();
        enc.u32(0).u16(0).u16(1);
        enc.u16(0x1234).u16(0);
        assert!(matches!(CpfPacket::decode(&enc.into_vec()), Err(PlcError::Unsupported(_))));
    }
}
