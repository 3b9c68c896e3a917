//! CIP service request/response framing: the generic header, Forward
//! Open/Close, Read/Write Tag (plain and fragmented), and Multiple Service
//! Packet.

use super::{Decoder, Encoder};
use crate::error::{decode_cip_status, PlcError, PlcResult};

pub const SERVICE_FORWARD_OPEN: u8 = 0x54;
pub const SERVICE_LARGE_FORWARD_OPEN: u8 = 0x5B;
pub const SERVICE_FORWARD_CLOSE: u8 = 0x4E;
/// Same numeric code as Forward Close; Rockwell overloads `0x4E` as the
/// Symbol object's Read-Modify-Write service when the request path names
/// a tag instead of the Connection Manager.
pub const SERVICE_READ_MODIFY_WRITE: u8 = 0x4E;
pub const SERVICE_READ_TAG: u8 = 0x4C;
pub const SERVICE_READ_TAG_FRAGMENTED: u8 = 0x52;
pub const SERVICE_WRITE_TAG: u8 = 0x4D;
pub const SERVICE_WRITE_TAG_FRAGMENTED: u8 = 0x53;
pub const SERVICE_PCCC_EXECUTE: u8 = 0x4B;
pub const SERVICE_MULTIPLE_SERVICE_PACKET: u8 = 0x0A;
pub const SERVICE_REPLY_BIT: u8 = 0x80;

pub const STATUS_MORE_DATA: u8 = 0x06;
pub const STATUS_PARTIAL_ERROR: u8 = 0x1E;

pub const CONNECTION_MANAGER_PATH: [u8; 4] = [0x20, 0x06, 0x24, 0x01];
pub const MULTIPLE_SERVICE_PATH: [u8; 4] = [0x20, 0x02, 0x24, 0x01];
pub const PCCC_EXECUTE_PATH: [u8; 4] = [0x20, 0x67, 0x24, 0x01];

pub const ORIGINATOR_VENDOR_ID: u16 = 0xF33D;
pub const ORIGINATOR_SERIAL_NUMBER: u32 = 0x2150_4345;

/// Connection Manager timeout ticks carried in every Forward Open/Close
/// request. Matches `FORWARD_OPEN_TIMEOUT_TICKS` in the original source.
pub const FORWARD_OPEN_TIMEOUT_TICKS: u8 = 0x05;

/// Writes a CIP request header: service code, path word count, path bytes.
pub fn encode_request_header(enc: &mut Encoder, service: u8, path: &[u8]) {
    debug_assert!(path.len() % 2 == 0, "CIP path must be word-aligned");
    enc.u8(service).u8((path.len() / 2) as u8).bytes(path);
}

/// Decoded CIP reply header, with the general/additional status already
/// turned into a [`PlcError`] when non-zero.
#[derive(Debug)]
pub struct ReplyHeader {
    pub service: u8,
    pub general_status: u8,
    pub additional_status: Vec<u16>,
}

impl ReplyHeader {
    pub fn ok(&self) -> PlcResult<()> {
        if self.general_status == 0 {
            return Ok(());
        }
        if self.general_status == STATUS_MORE_DATA {
            return Ok(());
        }
        let additional = self.additional_status.first().copied();
        Err(decode_cip_status(self.general_status, additional))
    }

    pub fn needs_more_data(&self) -> bool {
        self.general_status == STATUS_MORE_DATA
    }
}

/// Decodes the reply service/reserved/status preamble, returning the
/// header and the remaining reply-specific body.
pub fn decode_reply_header(buf: &[u8]) -> PlcResult<(ReplyHeader, &[u8])> {
    let mut dec = Decoder::new(buf);
    let service = dec.u8()?;
    let _reserved = dec.u8()?;
    let general_status = dec.u8()?;
    let additional_status_words = dec.u8()? as usize;
    let mut additional_status = Vec::with_capacity(additional_status_words);
    for _ in 0..additional_status_words {
        additional_status.push(dec.u16()?);
    }
    let header = ReplyHeader { service, general_status, additional_status };
    Ok((header, dec.rest()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOpenVariant {
    Standard,
    Large,
}

/// Connection parameters bitfield, packed per variant by [`encode_forward_open`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectionParams {
    pub size_bytes: u16,
    pub fixed_size: bool,
    pub priority: u8,
    pub connection_type: u8,
    pub redundant_owner: bool,
}

impl ConnectionParams {
    /// `0x43F8`-style small-variant encoding: owner(1) | type(2) | reserved(1)
    /// | fixed/var(1) | priority(2) | size(9).
    fn pack_small(&self) -> u16 {
        let mut v = self.size_bytes & 0x01FF;
        if self.fixed_size {
            v |= 0x0200;
        }
        v |= (self.priority as u16 & 0x03) << 10;
        v |= (self.connection_type as u16 & 0x03) << 13;
        if self.redundant_owner {
            v |= 0x8000;
        }
        v
    }

    fn pack_large(&self) -> u32 {
        let mut v = self.size_bytes as u32 & 0xFFFF;
        if self.fixed_size {
            v |= 0x0002_0000;
        }
        v |= (self.priority as u32 & 0x03) << 26;
        v |= (self.connection_type as u32 & 0x03) << 29;
        if self.redundant_owner {
            v |= 0x8000_0000;
        }
        v
    }
}

pub struct ForwardOpenRequest {
    pub variant: ForwardOpenVariant,
    pub connection_serial_number: u16,
    pub orig_to_targ_conn_id: u32,
    pub targ_to_orig_conn_id: u32,
    pub timeout_multiplier: u8,
    pub orig_to_targ_rpi_us: u32,
    pub orig_to_targ_params: ConnectionParams,
    pub targ_to_orig_rpi_us: u32,
    pub targ_to_orig_params: ConnectionParams,
    pub connection_path: Vec<u8>,
}

/// Encodes a full Forward Open CIP request (header + body).
pub fn encode_forward_open(req: &ForwardOpenRequest) -> Vec<u8> {
    let service = match req.variant {
        ForwardOpenVariant::Standard => SERVICE_FORWARD_OPEN,
        ForwardOpenVariant::Large => SERVICE_LARGE_FORWARD_OPEN,
    };
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, service, &CONNECTION_MANAGER_PATH);
    enc.u8(0x0A); // priority/tick time
    enc.u8(FORWARD_OPEN_TIMEOUT_TICKS);
    enc.u32(req.orig_to_targ_conn_id);
    enc.u32(req.targ_to_orig_conn_id);
    enc.u16(req.connection_serial_number);
    enc.u16(ORIGINATOR_VENDOR_ID);
    enc.u32(ORIGINATOR_SERIAL_NUMBER);
    enc.u8(req.timeout_multiplier);
    enc.bytes(&[0, 0, 0]);
    enc.u32(req.orig_to_targ_rpi_us);
    match req.variant {
        ForwardOpenVariant::Standard => {
            enc.u16(req.orig_to_targ_params.pack_small());
        }
        ForwardOpenVariant::Large => {
            enc.u32(req.orig_to_targ_params.pack_large());
        }
    }
    enc.u32(req.targ_to_orig_rpi_us);
    match req.variant {
        ForwardOpenVariant::Standard => {
            enc.u16(req.targ_to_orig_params.pack_small());
        }
        ForwardOpenVariant::Large => {
            enc.u32(req.targ_to_orig_params.pack_large());
        }
    }
    enc.u8(0xA3); // transport class
    enc.u8((req.connection_path.len() / 2) as u8);
    enc.bytes(&req.connection_path);
    enc.into_vec()
}

#[derive(Debug, Clone, Copy)]
pub struct ForwardOpenReply {
    pub orig_to_targ_conn_id: u32,
    pub targ_to_orig_conn_id: u32,
    pub connection_serial_number: u16,
    pub orig_to_targ_api_us: u32,
    pub targ_to_orig_api_us: u32,
}

/// Decodes a successful Forward Open reply body (caller checks
/// [`ReplyHeader::ok`] first).
pub fn decode_forward_open_reply(body: &[u8]) -> PlcResult<ForwardOpenReply> {
    let mut dec = Decoder::new(body);
    let orig_to_targ_conn_id = dec.u32()?;
    let targ_to_orig_conn_id = dec.u32()?;
    let connection_serial_number = dec.u16()?;
    let _vendor_id = dec.u16()?;
    let _serial_number = dec.u32()?;
    let orig_to_targ_api_us = dec.u32()?;
    let targ_to_orig_api_us = dec.u32()?;
    let app_reply_size = dec.u8()? as usize;
    let _reserved = dec.u8()?;
    let _app_reply = dec.bytes(app_reply_size * 2)?;
    Ok(ForwardOpenReply {
        orig_to_targ_conn_id,
        targ_to_orig_conn_id,
        connection_serial_number,
        orig_to_targ_api_us,
        targ_to_orig_api_us,
    })
}

/// Encodes a Forward Close request.
pub fn encode_forward_close(
    connection_serial_number: u16,
    connection_path: &[u8],
) -> Vec<u8> {
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, SERVICE_FORWARD_CLOSE, &CONNECTION_MANAGER_PATH);
    enc.u8(0x0A);
    enc.u8(FORWARD_OPEN_TIMEOUT_TICKS);
    enc.u16(connection_serial_number);
    enc.u16(ORIGINATOR_VENDOR_ID);
    enc.u32(ORIGINATOR_SERIAL_NUMBER);
    enc.u8((connection_path.len() / 2) as u8);
    enc.u8(0);
    enc.bytes(connection_path);
    enc.into_vec()
}

/// Encodes a plain CIP Read Tag request.
pub fn encode_read_tag(tag_path: &[u8], element_count: u16) -> Vec<u8> {
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, SERVICE_READ_TAG, tag_path);
    enc.u16(element_count);
    enc.into_vec()
}

/// Encodes a fragmented CIP Read Tag request.
pub fn encode_read_tag_fragmented(tag_path: &[u8], element_count: u16, byte_offset: u32) -> Vec<u8> {
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, SERVICE_READ_TAG_FRAGMENTED, tag_path);
    enc.u16(element_count).u32(byte_offset);
    enc.into_vec()
}

/// Decoded Read Tag reply body: the CIP element type code (present only on
/// the first fragment) and the raw element bytes that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTagReply {
    pub type_code: Option<u16>,
    pub data: Vec<u8>,
}

/// Decodes a Read Tag / Read Tag Fragmented reply body. `first_fragment`
/// must be true only for the first call in a fragmented sequence, since
/// continuation packets omit the type code per SPEC_FULL.md §4.2.
pub fn decode_read_tag_reply(body: &[u8], first_fragment: bool) -> PlcResult<ReadTagReply> {
    let mut dec = Decoder::new(body);
    let type_code = if first_fragment { Some(dec.u16()?) } else { None };
    Ok(ReadTagReply { type_code, data: dec.rest().to_vec() })
}

/// Encodes a plain CIP Write Tag request.
pub fn encode_write_tag(tag_path: &[u8], cip_type: u16, element_count: u16, data: &[u8]) -> Vec<u8> {
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, SERVICE_WRITE_TAG, tag_path);
    enc.u16(cip_type).u16(element_count).bytes(data);
    enc.into_vec()
}

/// Encodes a fragmented CIP Write Tag request.
pub fn encode_write_tag_fragmented(
    tag_path: &[u8],
    cip_type: u16,
    element_count: u16,
    byte_offset: u32,
    data: &[u8],
) -> Vec<u8> {
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, SERVICE_WRITE_TAG_FRAGMENTED, tag_path);
    enc.u16(cip_type).u16(element_count).u32(byte_offset).bytes(data);
    enc.into_vec()
}

/// Encodes a Multiple Service Packet request wrapping already-encoded
/// sub-requests (each a full CIP request: service + path + body).
pub fn encode_multiple_service_packet(sub_requests: &[Vec<u8>]) -> Vec<u8> {
    let mut enc = Encoder::new();
    encode_request_header(&mut enc, SERVICE_MULTIPLE_SERVICE_PACKET, &MULTIPLE_SERVICE_PATH);
    enc.u16(sub_requests.len() as u16);
    let header_len = 2 + sub_requests.len() * 2;
    let mut offset = header_len;
    for sub in sub_requests {
        enc.u16(offset as u16);
        offset += sub.len();
    }
    for sub in sub_requests {
        enc.bytes(sub);
    }
    enc.into_vec()
}

/// Splits a Multiple Service Packet reply body into its per-sub-request
/// reply slices, using the embedded offset table.
pub fn decode_multiple_service_packet(body: &[u8]) -> PlcResult<Vec<&[u8]>> {
    let mut dec = Decoder::new(body);
    let count = dec.u16()? as usize;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(dec.u16()? as usize);
    }
    let mut replies = Vec::with_capacity(count);
    for i in 0..count {
        let start = offsets[i];
        let end = if i + 1 < count { offsets[i + 1] } else { body.len() };
        if start > body.len() || end > body.len() || start > end {
            return Err(PlcError::BadData("multiple service packet offset out of range".into()));
        }
        replies.push(&body[start..end]);
    }
    Ok(replies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tag_round_trips_type_code_on_first_fragment() {
        let req = encode_read_tag(&[0x91, 2, b'X', b'Y'], 1);
        assert_eq!(req[0], SERVICE_READ_TAG);

        let mut reply_body = vec![0xC4, 0x00];
        reply_body.extend_from_slice(&42i32.to_le_bytes());
        let reply = decode_read_tag_reply(&reply_body, true).unwrap();
        assert_eq!(reply.type_code, Some(0x00C4));
        assert_eq!(reply.data, 42i32.to_le_bytes());
    }

    #[test]
    fn read_tag_continuation_has_no_type_code() {
        let reply = decode_read_tag_reply(&[1, 2, 3, 4], false).unwrap();
        assert_eq!(reply.type_code, None);
        assert_eq!(reply.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn forward_open_small_packs_connection_params() {
        let req = ForwardOpenRequest {
            variant: ForwardOpenVariant::Standard,
            connection_serial_number: 1,
            orig_to_targ_conn_id: 0,
            targ_to_orig_conn_id: 0,
            timeout_multiplier: 1,
            orig_to_targ_rpi_us: 2_000_000,
            orig_to_targ_params: ConnectionParams {
                size_bytes: 504,
                fixed_size: true,
                priority: 0,
                connection_type: 2,
                redundant_owner: false,
            },
            targ_to_orig_rpi_us: 2_000_000,
            targ_to_orig_params: ConnectionParams {
                size_bytes: 504,
                fixed_size: true,
                priority: 0,
                connection_type: 2,
                redundant_owner: false,
            },
            connection_path: vec![0x20, 0x02, 0x24, 0x01],
        };
        let encoded = encode_forward_open(&req);
        assert_eq!(encoded[0], SERVICE_FORWARD_OPEN);
        // priority/tick time, then the connection manager timeout ticks.
        assert_eq!(encoded[2], 0x0A);
        assert_eq!(encoded[3], FORWARD_OPEN_TIMEOUT_TICKS);
        assert_eq!(req.orig_to_targ_params.pack_small(), 0x43F8);
    }

    #[test]
    fn forward_close_carries_the_correct_timeout_ticks() {
        let encoded = encode_forward_close(1, &[0x20, 0x02, 0x24, 0x01]);
        assert_eq!(encoded[0], SERVICE_FORWARD_CLOSE);
        assert_eq!(encoded[2], 0x0A);
        assert_eq!(encoded[3], FORWARD_OPEN_TIMEOUT_TICKS);
    }

    #[test]
    fn multiple_service_packet_round_trip() {
        let sub1 = vec![0x4C, 0x02, 0x91, 2, b'A', b'B', 1, 0];
        let sub2 = vec![0x4C, 0x02, 0x91, 2, b'C', b'D', 1, 0];
        let req = encode_multiple_service_packet(&[sub1.clone(), sub2.clone()]);
        assert_eq!(req[0], SERVICE_MULTIPLE_SERVICE_PACKET);

        // Build a fake reply body with the same shape the request used
        // (offset table then concatenated bodies) to exercise decode.
        let mut body = Vec::new();
        body.extend_from_slice(&2u16.to_le_bytes());
        let header_len = 2 + 2 * 2;
        body.extend_from_slice(&(header_len as u16).to_le_bytes());
        body.extend_from_slice(&((header_len + sub1.len()) as u16).to_le_bytes());
        body.extend_from_slice(&sub1);
        body.extend_from_slice(&sub2);
        let replies = decode_multiple_service_packet(&body).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], &sub1[..]);
        assert_eq!(replies[1], &sub2[..]);
    }

    #[test]
    fn reply_header_more_data_is_not_an_error() {
        let mut buf = vec![SERVICE_READ_TAG | SERVICE_REPLY_BIT, 0, STATUS_MORE_DATA, 0];
        buf.extend_from_slice(&[0xC4, 0x00, 1, 2]);
        let (header, rest) = decode_reply_header(&buf).unwrap();
        assert!(header.needs_more_data());
        header.ok().unwrap();
        assert_eq!(rest, &[0xC4, 0x00, 1, 2]);
    }
}
