//! PCCC-Execute (CIP service `0x4B`) body encoding: the common PCCC command
//! header plus the eight function bodies named in SPEC_FULL.md §4.2.
//!
//! Grounded on `src/protocols/ab/pccc.c`'s command-block layout and on
//! the DH+-bridged frame's BCC/CRC16 trailer, implemented in
//! [`crate::path::pccc_address`].

use super::{Decoder, Encoder};
use crate::error::PlcResult;

pub const FUNC_PLC5_TYPED_READ: u8 = 0x01;
pub const FUNC_PLC5_TYPED_WRITE: u8 = 0x00;
pub const FUNC_PLC5_READ_MODIFY_WRITE: u8 = 0x26;
pub const FUNC_PCCC_ON_CIP_TYPED_READ: u8 = 0x68;
pub const FUNC_PCCC_ON_CIP_TYPED_WRITE: u8 = 0x67;
pub const FUNC_SLC_PROTECTED_TYPED_LOGICAL_READ: u8 = 0xA2;
pub const FUNC_SLC_PROTECTED_TYPED_LOGICAL_WRITE: u8 = 0xAA;
pub const FUNC_SLC_PROTECTED_TYPED_LOGICAL_BIT_WRITE: u8 = 0xAB;

const REQUESTOR_ID_LEN: u8 = 7;

/// Header common to every PCCC-Execute body, per SPEC_FULL.md §4.2.
#[derive(Debug, Clone, Copy)]
pub struct PcccExecuteHeader {
    pub vendor_id: u16,
    pub vendor_serial: u32,
    pub cmd: u8,
    pub transaction_sequence: u16,
    pub function: u8,
}

impl PcccExecuteHeader {
    fn encode(&self, enc: &mut Encoder) {
        enc.u8(REQUESTOR_ID_LEN)
            .u16(self.vendor_id)
            .u32(self.vendor_serial)
            .u8(self.cmd)
            .u8(0) // status, always 0 on a request
            .u16(self.transaction_sequence)
            .u8(self.function);
    }
}

/// Encodes a PLC-5/PCCC-on-CIP typed read: address bytes then `u16 byte_size`.
pub fn encode_typed_read(header: PcccExecuteHeader, address: &[u8], byte_size: u16) -> Vec<u8> {
    let mut enc = Encoder::new();
    header.encode(&mut enc);
    enc.bytes(address).u16(byte_size);
    enc.into_vec()
}

/// Encodes a PLC-5/PCCC-on-CIP typed write: address bytes then raw data.
pub fn encode_typed_write(header: PcccExecuteHeader, address: &[u8], data: &[u8]) -> Vec<u8> {
    let mut enc = Encoder::new();
    header.encode(&mut enc);
    enc.bytes(address).bytes(data);
    enc.into_vec()
}

/// Encodes an SLC protected typed-logical read: address bytes then
/// `u8 element_count`.
pub fn encode_slc_logical_read(header: PcccExecuteHeader, address: &[u8], element_count: u8) -> Vec<u8> {
    let mut enc = Encoder::new();
    header.encode(&mut enc);
    enc.bytes(address).u8(element_count);
    enc.into_vec()
}

/// Encodes an SLC protected typed-logical write: address bytes, element
/// count, then raw data.
pub fn encode_slc_logical_write(
    header: PcccExecuteHeader,
    address: &[u8],
    element_count: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut enc = Encoder::new();
    header.encode(&mut enc);
    enc.bytes(address).u8(element_count).bytes(data);
    enc.into_vec()
}

/// Encodes an SLC protected typed-logical bit write: address bytes,
/// `u16 or_mask`, `u16 and_mask`.
pub fn encode_slc_logical_bit_write(header: PcccExecuteHeader, address: &[u8], or_mask: u16, and_mask: u16) -> Vec<u8> {
    let mut enc = Encoder::new();
    header.encode(&mut enc);
    enc.bytes(address).u16(or_mask).u16(and_mask);
    enc.into_vec()
}

/// Decoded PCCC-Execute reply header, present on both read and write
/// replies ahead of any function-specific body.
#[derive(Debug, Clone, Copy)]
pub struct PcccExecuteReplyHeader {
    pub vendor_id: u16,
    pub vendor_serial: u32,
    pub cmd: u8,
    pub status: u8,
    pub transaction_sequence: u16,
}

/// Decodes the PCCC-Execute reply preamble, returning the header and the
/// function-specific body (the raw read data, or empty for a write ack).
pub fn decode_execute_reply(body: &[u8]) -> PlcResult<(PcccExecuteReplyHeader, &[u8])> {
    let mut dec = Decoder::new(body);
    let _requestor_id_len = dec.u8()?;
    let vendor_id = dec.u16()?;
    let vendor_serial = dec.u32()?;
    let cmd = dec.u8()?;
    let status = dec.u8()?;
    let transaction_sequence = dec.u16()?;
    let header = PcccExecuteReplyHeader { vendor_id, vendor_serial, cmd, status, transaction_sequence };
    Ok((header, dec.rest()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PcccExecuteHeader {
        PcccExecuteHeader {
            vendor_id: 1,
            vendor_serial: 0x1234_5678,
            cmd: 0x0F,
            transaction_sequence: 7,
            function: FUNC_SLC_PROTECTED_TYPED_LOGICAL_READ,
        }
    }

    #[test]
    fn typed_read_layout() {
        let encoded = encode_typed_read(header(), &[1, 0x89, 2, 0], 2);
        assert_eq!(encoded[0], REQUESTOR_ID_LEN);
        assert_eq!(encoded[encoded.len() - 2..], 2u16.to_le_bytes());
    }

    #[test]
    fn reply_header_round_trips() {
        let mut body = vec![REQUESTOR_ID_LEN, 1, 0, 0x78, 0x56, 0x34, 0x12, 0x0F, 0x00];
        body.extend_from_slice(&7u16.to_le_bytes());
        body.extend_from_slice(&[0xAA, 0xBB]);
        let (h, rest) = decode_execute_reply(&body).unwrap();
        assert_eq!(h.vendor_serial, 0x1234_5678);
        assert_eq!(h.transaction_sequence, 7);
        assert_eq!(rest, &[0xAA, 0xBB]);
    }
}
