//! EtherNet/IP encapsulation header and Register/Unregister-Session bodies.
//!
//! Grounded on SPEC_FULL.md §4.2; the 24-byte layout mirrors the teacher's
//! framed-header style in `src/ipc/unix_domain_socket.rs` (length-prefixed
//! framing read as a fixed header then a variable body).

use super::{Decoder, Encoder};
use crate::error::{PlcError, PlcResult};

pub const ENCAP_HEADER_LEN: usize = 24;

pub const CMD_REGISTER_SESSION: u16 = 0x0065;
pub const CMD_UNREGISTER_SESSION: u16 = 0x0066;
pub const CMD_SEND_RR_DATA: u16 = 0x006F;
pub const CMD_SEND_UNIT_DATA: u16 = 0x0070;

/// The 24-byte EtherNet/IP encapsulation header shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapHeader {
    pub command: u16,
    pub payload_length: u16,
    pub session_handle: u32,
    pub status: u32,
    pub sender_context: u64,
    pub options: u32,
}

impl EncapHeader {
    pub fn new(command: u16, payload_length: u16, session_handle: u32, sender_context: u64) -> Self {
        Self {
            command,
            payload_length,
            session_handle,
            status: 0,
            sender_context,
            options: 0,
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.u16(self.command)
            .u16(self.payload_length)
            .u32(self.session_handle)
            .u32(self.status)
            .u64(self.sender_context)
            .u32(self.options);
    }

    pub fn decode(dec: &mut Decoder) -> PlcResult<Self> {
        Ok(Self {
            command: dec.u16()?,
            payload_length: dec.u16()?,
            session_handle: dec.u32()?,
            status: dec.u32()?,
            sender_context: dec.u64()?,
            options: dec.u32()?,
        })
    }
}

/// Register-Session request/response payload: `u16 eip_version, u16 option_flags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSessionPayload {
    pub eip_version: u16,
    pub option_flags: u16,
}

impl RegisterSessionPayload {
    pub const WIRE_LEN: u16 = 4;

    pub fn request() -> Self {
        Self { eip_version: 1, option_flags: 0 }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.u16(self.eip_version).u16(self.option_flags);
    }

    pub fn decode(dec: &mut Decoder) -> PlcResult<Self> {
        Ok(Self {
            eip_version: dec.u16()?,
            option_flags: dec.u16()?,
        })
    }
}

/// Serializes a full Register-Session frame (header + 4-byte payload).
pub fn encode_register_session(sender_context: u64) -> Vec<u8> {
    let mut enc = Encoder::with_capacity(ENCAP_HEADER_LEN + 4);
    EncapHeader::new(CMD_REGISTER_SESSION, RegisterSessionPayload::WIRE_LEN, 0, sender_context)
        .encode(&mut enc);
    RegisterSessionPayload::request().encode(&mut enc);
    enc.into_vec()
}

/// Serializes a full Unregister-Session frame (header only, no payload).
pub fn encode_unregister_session(session_handle: u32, sender_context: u64) -> Vec<u8> {
    let mut enc = Encoder::with_capacity(ENCAP_HEADER_LEN);
    EncapHeader::new(CMD_UNREGISTER_SESSION, 0, session_handle, sender_context).encode(&mut enc);
    enc.into_vec()
}

/// Decodes just the header from a buffer known to hold at least
/// [`ENCAP_HEADER_LEN`] bytes, returning the header and the remaining
/// payload slice.
pub fn decode_frame(buf: &[u8]) -> PlcResult<(EncapHeader, &[u8])> {
    if buf.len() < ENCAP_HEADER_LEN {
        return Err(PlcError::BadData("short EIP encapsulation header".into()));
    }
    let mut dec = Decoder::new(&buf[..ENCAP_HEADER_LEN]);
    let header = EncapHeader::decode(&mut dec)?;
    let payload_end = ENCAP_HEADER_LEN + header.payload_length as usize;
    if buf.len() < payload_end {
        return Err(PlcError::BadData("short EIP payload".into()));
    }
    Ok((header, &buf[ENCAP_HEADER_LEN..payload_end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_session_round_trip() {
        let frame = encode_register_session(0x1122_3344_5566_7788);
        assert_eq!(frame.len(), ENCAP_HEADER_LEN + 4);
        let (header, payload) = decode_frame(&frame).unwrap();
        assert_eq!(header.command, CMD_REGISTER_SESSION);
        assert_eq!(header.sender_context, 0x1122_3344_5566_7788);
        let mut dec = Decoder::new(payload);
        let body = RegisterSessionPayload::decode(&mut dec).unwrap();
        assert_eq!(body.eip_version, 1);
        assert_eq!(body.option_flags, 0);
    }

    #[test]
    fn short_header_is_bad_data() {
        let buf = [0u8; 10];
        assert!(matches!(decode_frame(&buf), Err(PlcError::BadData(_))));
    }

    #[test]
    fn unregister_has_no_payload() {
        let frame = encode_unregister_session(0xAABBCCDD, 1);
        assert_eq!(frame.len(), ENCAP_HEADER_LEN);
        let (header, payload) = decode_frame(&frame).unwrap();
        assert_eq!(header.command, CMD_UNREGISTER_SESSION);
        assert_eq!(header.session_handle, 0xAABBCCDD);
        assert!(payload.is_empty());
    }
}
