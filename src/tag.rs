//! Tag Coordinator: per-tag state machine and the typed-accessor API over
//! the tag's cached byte buffer. See SPEC_FULL.md §4.5 and §6.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::attrib::TagConfig;
use crate::codec::cip::{self, decode_reply_header};
use crate::codec::cpf::CpfPacket;
use crate::codec::eip;
use crate::codec::pccc::{self, PcccExecuteHeader};
use crate::error::{decode_pccc_status, PlcError, PlcResult};
use crate::path::{
    cip_encode_tag_name, parse_pccc_logical_address, plc5_encode_address, slc_encode_address,
    BitAddress, PlcFamily,
};
use crate::registry;
use crate::request::{MatchKey, PendingRequest};
use crate::session::Session;

/// Maximum CIP payload for a classic (non-Large) Forward Open connection.
const MAX_CLASSIC_PAYLOAD: usize = 504;
const CIP_HEADER_OVERHEAD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagOp {
    Idle,
    ReadRequest,
    ReadResponse,
    WriteRequest,
    WriteResponse,
}

struct TagState {
    op: TagOp,
    last_error: Option<PlcError>,
    cache_expire: Option<Instant>,
    in_flight_request_id: Option<u64>,
    bytes_done: usize,
    type_code: Option<u16>,
    first_fragment: bool,
}

static NEXT_TAG_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// One tag handle: an encoded CIP name or PCCC address, a byte cache, and
/// the state machine that drives reads/writes through its session.
pub struct Tag {
    pub config: TagConfig,
    session: Arc<Session>,
    encoded_name: Vec<u8>,
    bit_index: Option<u8>,
    buffer: Mutex<Vec<u8>>,
    state: Mutex<TagState>,
    /// Notified by [`Tag::step`] on every tick so [`Tag::read_with_timeout`]
    /// / [`Tag::write_with_timeout`] can wait efficiently instead of
    /// spin-polling `status()`.
    cond: Condvar,
}

impl Tag {
    /// Creates a tag from an attribute string, resolving (and retaining a
    /// reference to) the session it will be routed through.
    pub fn create(attr_str: &str) -> PlcResult<Arc<Tag>> {
        let config = TagConfig::from_attr_string(attr_str)?;
        let session = registry::find_or_create_session(
            &config.gateway,
            config.gateway_port,
            config.path.as_deref(),
            config.family,
        )?;
        if config.allow_packing {
            session.enable_packing();
        }

        let (encoded_name, bit_index) = if config.family.is_pccc() {
            let addr = parse_pccc_logical_address(&config.name)?;
            let bytes = if config.family == PlcFamily::Plc5 {
                plc5_encode_address(&addr)?
            } else {
                slc_encode_address(&addr)?
            };
            (bytes, addr.bit.map(BitAddress::Pccc).map(bit_value))
        } else {
            let encoded = cip_encode_tag_name(&config.name)?;
            (encoded.bytes, encoded.bit.map(BitAddress::Cip).map(bit_value))
        };

        let elem_size = config.elem_size.unwrap_or(0) as usize;
        let elem_count = config.elem_count as usize;
        let initial_len = elem_size.saturating_mul(elem_count);

        let tag = Arc::new(Tag {
            config,
            session,
            encoded_name,
            bit_index,
            buffer: Mutex::new(vec![0u8; initial_len]),
            state: Mutex::new(TagState {
                op: TagOp::Idle,
                last_error: None,
                cache_expire: None,
                in_flight_request_id: None,
                bytes_done: 0,
                type_code: None,
                first_fragment: true,
            }),
            cond: Condvar::new(),
        });
        crate::io_handler::register_tag(&tag);
        Ok(tag)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether requests for this tag should ride a CIP Class-3 connection
    /// rather than travel unconnected, honoring an explicit
    /// `use_connected_msg` override before falling back to the PLC family's
    /// default per SPEC_FULL.md §6.
    fn wants_connected_messaging(&self) -> bool {
        self.config.use_connected_msg.unwrap_or_else(|| self.config.family.requires_cip_connection())
    }

    /// Wraps a CIP body for transmission, opening this tag's session's CIP
    /// connection first if needed. `Ok(None)` means the caller should retry
    /// next tick once the connection finishes opening.
    fn frame_for_send(&self, body: Vec<u8>) -> PlcResult<Option<(Vec<u8>, MatchKey)>> {
        if self.wants_connected_messaging() {
            if self.session.connection_scope().is_none() {
                self.session.begin_opening();
                return Ok(None);
            }
            Ok(Some(self.session.frame_connected(body)?))
        } else {
            let sender_context = self.session.next_sender_context();
            let frame = self.session.frame_unconnected(body, sender_context);
            Ok(Some((frame, MatchKey::Unconnected { session_sequence_id: sender_context })))
        }
    }

    /// Begins a read. Returns `PENDING` immediately; poll [`Tag::status`].
    pub fn read(self: &Arc<Self>) -> PlcResult<()> {
        let mut state = self.state.lock();
        if state.op != TagOp::Idle {
            return Err(PlcError::BadParam("tag already has an operation in progress".into()));
        }
        state.op = TagOp::ReadRequest;
        state.last_error = None;
        state.bytes_done = 0;
        state.first_fragment = true;
        Ok(())
    }

    /// Begins a write of the tag's current buffer contents.
    pub fn write(self: &Arc<Self>) -> PlcResult<()> {
        let mut state = self.state.lock();
        if state.op != TagOp::Idle {
            return Err(PlcError::BadParam("tag already has an operation in progress".into()));
        }
        state.op = TagOp::WriteRequest;
        state.last_error = None;
        state.cache_expire = None;
        state.bytes_done = 0;
        Ok(())
    }

    /// `Ok(Some(()))` once the operation has completed (successfully);
    /// `Ok(None)` while still pending; `Err` on failure.
    pub fn status(&self) -> PlcResult<Option<()>> {
        let state = self.state.lock();
        if let Some(err) = &state.last_error {
            return Err(err.clone());
        }
        if state.op == TagOp::Idle {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    }

    pub fn abort(&self) {
        let mut state = self.state.lock();
        if let Some(id) = state.in_flight_request_id {
            if let Some(req) = self.session.requests().find_by_id_mut(id) {
                req.abort_requested = true;
            }
        }
        state.op = TagOp::Idle;
        state.last_error = Some(PlcError::Abort);
        drop(state);
        self.cond.notify_all();
    }

    /// Begins a read and blocks until it completes, fails, or `timeout_ms`
    /// elapses. On expiry the in-flight request is aborted and the status
    /// becomes [`PlcError::Timeout`].
    pub fn read_with_timeout(self: &Arc<Self>, timeout_ms: u64) -> PlcResult<()> {
        self.read()?;
        self.wait_with_timeout(timeout_ms)
    }

    /// Begins a write and blocks until it completes, fails, or `timeout_ms`
    /// elapses. On expiry the in-flight request is aborted and the status
    /// becomes [`PlcError::Timeout`].
    pub fn write_with_timeout(self: &Arc<Self>, timeout_ms: u64) -> PlcResult<()> {
        self.write()?;
        self.wait_with_timeout(timeout_ms)
    }

    fn wait_with_timeout(&self, timeout_ms: u64) -> PlcResult<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut state = self.state.lock();
        loop {
            if let Some(err) = &state.last_error {
                return Err(err.clone());
            }
            if state.op == TagOp::Idle {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.cond.wait_for(&mut state, deadline - now);
        }
        if let Some(id) = state.in_flight_request_id {
            if let Some(req) = self.session.requests().find_by_id_mut(id) {
                req.abort_requested = true;
            }
        }
        state.op = TagOp::Idle;
        state.last_error = Some(PlcError::Timeout);
        Err(PlcError::Timeout)
    }

    pub fn with_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.buffer.lock())
    }

    pub fn with_buffer_mut<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.buffer.lock())
    }

    /// Advances this tag's state machine one tick. Called by the I/O
    /// Handler for every tag attached to a session whose request list
    /// changed, per SPEC_FULL.md §4.6 step 4.
    pub fn step(self: &Arc<Self>) -> PlcResult<()> {
        let op = self.state.lock().op;
        let result = match op {
            TagOp::Idle => Ok(()),
            TagOp::ReadRequest => self.step_read_request(),
            TagOp::ReadResponse => self.step_read_response(),
            TagOp::WriteRequest => self.step_write_request(),
            TagOp::WriteResponse => self.step_write_response(),
        };
        self.cond.notify_all();
        result
    }

    fn step_read_request(self: &Arc<Self>) -> PlcResult<()> {
        let mut state = self.state.lock();
        if let Some(expire) = state.cache_expire {
            if Instant::now() < expire {
                state.op = TagOp::Idle;
                return Ok(());
            }
        }
        let byte_offset = state.bytes_done as u32;
        let remaining_budget = MAX_CLASSIC_PAYLOAD.saturating_sub(CIP_HEADER_OVERHEAD);
        let use_fragmented = self.buffer.lock().len() > remaining_budget || byte_offset > 0;

        let body = if self.config.family.is_pccc() {
            self.build_pccc_read()
        } else if use_fragmented {
            cip::encode_read_tag_fragmented(&self.encoded_name, self.config.elem_count as u16, byte_offset)
        } else {
            cip::encode_read_tag(&self.encoded_name, self.config.elem_count as u16)
        };

        let Some((frame, match_key)) = self.frame_for_send(body)? else {
            return Ok(());
        };
        let id = NEXT_TAG_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        self.session.requests().append(PendingRequest::new(id, match_key, frame));
        state.in_flight_request_id = Some(id);
        state.op = TagOp::ReadResponse;
        Ok(())
    }

    fn step_read_response(self: &Arc<Self>) -> PlcResult<()> {
        let id = match self.state.lock().in_flight_request_id {
            Some(id) => id,
            None => return Ok(()),
        };
        let response = {
            let mut requests = self.session.requests();
            let req = match requests.find_by_id_mut(id) {
                Some(r) => r,
                None => {
                    self.fail(PlcError::BadConnection("request lost before response arrived".into()));
                    return Ok(());
                }
            };
            if !req.response_received() {
                return Ok(());
            }
            requests.remove(id).and_then(|r| r.response)
        };
        let Some(response) = response else { return Ok(()) };
        let response = extract_cip_reply(&response)?;

        if self.config.family.is_pccc() {
            self.handle_pccc_read_reply(&response)
        } else {
            self.handle_cip_read_reply(&response)
        }
    }

    fn handle_cip_read_reply(self: &Arc<Self>, response: &[u8]) -> PlcResult<()> {
        let (header, body) = decode_reply_header(response)?;
        if header.needs_more_data() {
            let mut state = self.state.lock();
            let reply = cip::decode_read_tag_reply(body, state.first_fragment)?;
            if let Some(tc) = reply.type_code {
                state.type_code = Some(tc);
            }
            let done = state.bytes_done;
            drop(state);
            self.buffer.lock()[done..done + reply.data.len()].copy_from_slice(&reply.data);
            let mut state = self.state.lock();
            state.bytes_done += reply.data.len();
            state.first_fragment = false;
            state.op = TagOp::ReadRequest;
            return Ok(());
        }
        header.ok()?;
        let mut state = self.state.lock();
        let reply = cip::decode_read_tag_reply(body, state.first_fragment)?;
        if let Some(tc) = reply.type_code {
            state.type_code = Some(tc);
        }
        let done = state.bytes_done;
        drop(state);
        {
            let mut buf = self.buffer.lock();
            let end = done + reply.data.len();
            if buf.len() < end {
                buf.resize(end, 0);
            }
            buf[done..end].copy_from_slice(&reply.data);
        }
        let mut state = self.state.lock();
        state.bytes_done += reply.data.len();
        if self.config.read_cache_ms > 0 {
            state.cache_expire = Some(Instant::now() + Duration::from_millis(self.config.read_cache_ms));
        }
        state.op = TagOp::Idle;
        state.in_flight_request_id = None;
        Ok(())
    }

    fn handle_pccc_read_reply(self: &Arc<Self>, response: &[u8]) -> PlcResult<()> {
        let (_header, body) = decode_reply_header(response)?;
        let (reply_header, data) = pccc::decode_execute_reply(body)?;
        if reply_header.status != 0 {
            self.fail(decode_pccc_status(reply_header.status, None));
            return Ok(());
        }
        {
            let mut buf = self.buffer.lock();
            if buf.len() < data.len() {
                buf.resize(data.len(), 0);
            }
            buf[..data.len()].copy_from_slice(data);
        }
        let mut state = self.state.lock();
        if self.config.read_cache_ms > 0 {
            state.cache_expire = Some(Instant::now() + Duration::from_millis(self.config.read_cache_ms));
        }
        state.op = TagOp::Idle;
        state.in_flight_request_id = None;
        Ok(())
    }

    fn build_pccc_read(&self) -> Vec<u8> {
        let header = PcccExecuteHeader {
            vendor_id: cip::ORIGINATOR_VENDOR_ID,
            vendor_serial: cip::ORIGINATOR_SERIAL_NUMBER,
            cmd: 0x0F,
            transaction_sequence: self.session.next_sender_context() as u16,
            function: if self.config.family == PlcFamily::Plc5 {
                pccc::FUNC_PLC5_TYPED_READ
            } else {
                pccc::FUNC_SLC_PROTECTED_TYPED_LOGICAL_READ
            },
        };
        let inner = if self.config.family == PlcFamily::Plc5 {
            pccc::encode_typed_read(header, &self.encoded_name, self.buffer.lock().len() as u16)
        } else {
            pccc::encode_slc_logical_read(header, &self.encoded_name, self.config.elem_count as u8)
        };
        let mut enc = crate::codec::Encoder::new();
        cip::encode_request_header(&mut enc, cip::SERVICE_PCCC_EXECUTE, &cip::PCCC_EXECUTE_PATH);
        enc.bytes(&inner);
        enc.into_vec()
    }

    fn step_write_request(self: &Arc<Self>) -> PlcResult<()> {
        let mut state = self.state.lock();
        let byte_offset = state.bytes_done as u32;
        let data = self.buffer.lock().clone();
        let remaining_budget = MAX_CLASSIC_PAYLOAD.saturating_sub(CIP_HEADER_OVERHEAD + 6);
        let use_fragmented = data.len() > remaining_budget;

        let body = if self.bit_index.is_some() {
            self.build_bit_write()
        } else if self.config.family.is_pccc() {
            self.build_pccc_write(&data)
        } else {
            let cip_type = state.type_code.unwrap_or(0x00C4);
            if use_fragmented {
                let chunk_end = (byte_offset as usize + remaining_budget).min(data.len());
                cip::encode_write_tag_fragmented(
                    &self.encoded_name,
                    cip_type,
                    self.config.elem_count as u16,
                    byte_offset,
                    &data[byte_offset as usize..chunk_end],
                )
            } else {
                cip::encode_write_tag(&self.encoded_name, cip_type, self.config.elem_count as u16, &data)
            }
        };

        let Some((frame, match_key)) = self.frame_for_send(body)? else {
            return Ok(());
        };
        let id = NEXT_TAG_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        self.session.requests().append(PendingRequest::new(id, match_key, frame));
        state.in_flight_request_id = Some(id);
        state.op = TagOp::WriteResponse;
        Ok(())
    }

    fn build_pccc_write(&self, data: &[u8]) -> Vec<u8> {
        let header = PcccExecuteHeader {
            vendor_id: cip::ORIGINATOR_VENDOR_ID,
            vendor_serial: cip::ORIGINATOR_SERIAL_NUMBER,
            cmd: 0x0F,
            transaction_sequence: self.session.next_sender_context() as u16,
            function: if self.config.family == PlcFamily::Plc5 {
                pccc::FUNC_PLC5_TYPED_WRITE
            } else {
                pccc::FUNC_SLC_PROTECTED_TYPED_LOGICAL_WRITE
            },
        };
        let inner = if self.config.family == PlcFamily::Plc5 {
            pccc::encode_typed_write(header, &self.encoded_name, data)
        } else {
            pccc::encode_slc_logical_write(header, &self.encoded_name, self.config.elem_count as u8, data)
        };
        let mut enc = crate::codec::Encoder::new();
        cip::encode_request_header(&mut enc, cip::SERVICE_PCCC_EXECUTE, &cip::PCCC_EXECUTE_PATH);
        enc.bytes(&inner);
        enc.into_vec()
    }

    /// Bit-addressed tags always go through CIP Read-Modify-Write or the
    /// SLC bit-write function, never a plain element write, per
    /// SPEC_FULL.md §4.5.
    fn build_bit_write(&self) -> Vec<u8> {
        let bit = self.bit_index.unwrap_or(0);
        let data = self.buffer.lock().clone();
        let set = data.first().map(|b| *b != 0).unwrap_or(false);
        let mask = 1u16 << (bit.min(15));
        let (or_mask, and_mask) = if set { (mask, 0xFFFF) } else { (0, !mask) };

        if self.config.family.is_pccc() {
            let header = PcccExecuteHeader {
                vendor_id: cip::ORIGINATOR_VENDOR_ID,
                vendor_serial: cip::ORIGINATOR_SERIAL_NUMBER,
                cmd: 0x0F,
                transaction_sequence: self.session.next_sender_context() as u16,
                function: pccc::FUNC_SLC_PROTECTED_TYPED_LOGICAL_BIT_WRITE,
            };
            let inner = pccc::encode_slc_logical_bit_write(header, &self.encoded_name, or_mask, and_mask);
            let mut enc = crate::codec::Encoder::new();
            cip::encode_request_header(&mut enc, cip::SERVICE_PCCC_EXECUTE, &cip::PCCC_EXECUTE_PATH);
            enc.bytes(&inner);
            enc.into_vec()
        } else {
            let mut enc = crate::codec::Encoder::new();
            cip::encode_request_header(&mut enc, cip::SERVICE_READ_MODIFY_WRITE, &self.encoded_name);
            enc.u16(and_mask).u16(or_mask);
            enc.into_vec()
        }
    }

    fn step_write_response(self: &Arc<Self>) -> PlcResult<()> {
        let id = match self.state.lock().in_flight_request_id {
            Some(id) => id,
            None => return Ok(()),
        };
        let response = {
            let mut requests = self.session.requests();
            let req = match requests.find_by_id_mut(id) {
                Some(r) => r,
                None => {
                    self.fail(PlcError::BadConnection("request lost before response arrived".into()));
                    return Ok(());
                }
            };
            if !req.response_received() {
                return Ok(());
            }
            requests.remove(id).and_then(|r| r.response)
        };
        let Some(response) = response else { return Ok(()) };
        let response = extract_cip_reply(&response)?;

        if self.config.family.is_pccc() {
            let (_header, body) = decode_reply_header(&response)?;
            let (reply_header, _) = pccc::decode_execute_reply(body)?;
            if reply_header.status != 0 {
                self.fail(decode_pccc_status(reply_header.status, None));
                return Ok(());
            }
        } else {
            let (header, _body) = decode_reply_header(&response)?;
            if let Err(e) = header.ok() {
                self.fail(e);
                return Ok(());
            }
        }
        let mut state = self.state.lock();
        state.op = TagOp::Idle;
        state.in_flight_request_id = None;
        Ok(())
    }

    fn fail(&self, err: PlcError) {
        let mut state = self.state.lock();
        state.op = TagOp::Idle;
        state.in_flight_request_id = None;
        state.last_error = Some(err);
    }
}

impl Drop for Tag {
    fn drop(&mut self) {
        registry::release_session(&self.session);
    }
}

fn bit_value(addr: BitAddress) -> u8 {
    match addr {
        BitAddress::Cip(b) | BitAddress::Pccc(b) => b,
    }
}

/// Unwraps a full EIP-encapsulated reply frame down to its CIP
/// service/status/body bytes, stripping the encapsulation header and CPF
/// item list that [`Session::frame_unconnected`]/[`Session::frame_connected`]
/// add to every outgoing request.
fn extract_cip_reply(frame: &[u8]) -> PlcResult<Vec<u8>> {
    let (_header, payload) = eip::decode_frame(frame)?;
    let cpf = CpfPacket::decode(payload)?;
    Ok(cpf.cip_data()?.to_vec())
}

/// Typed accessors over a tag's cached byte buffer. Every getter/setter is
/// bounds-checked against the buffer and the element size; out-of-range
/// access returns [`PlcError::OutOfBounds`] rather than panicking.
impl Tag {
    fn check_bounds(&self, offset: usize, width: usize) -> PlcResult<()> {
        if self.buffer.lock().len() < offset + width {
            return Err(PlcError::OutOfBounds);
        }
        Ok(())
    }

    pub fn get_u8(&self, offset: usize) -> PlcResult<u8> {
        self.check_bounds(offset, 1)?;
        Ok(self.buffer.lock()[offset])
    }

    pub fn set_u8(&self, offset: usize, value: u8) -> PlcResult<()> {
        self.check_bounds(offset, 1)?;
        self.buffer.lock()[offset] = value;
        Ok(())
    }

    pub fn get_i8(&self, offset: usize) -> PlcResult<i8> {
        self.get_u8(offset).map(|v| v as i8)
    }

    pub fn set_i8(&self, offset: usize, value: i8) -> PlcResult<()> {
        self.set_u8(offset, value as u8)
    }

    pub fn get_bit(&self, offset: usize, bit: u8) -> PlcResult<bool> {
        if bit > 7 {
            return Err(PlcError::OutOfBounds);
        }
        Ok(self.get_u8(offset)? & (1 << bit) != 0)
    }

    pub fn set_bit(&self, offset: usize, bit: u8, value: bool) -> PlcResult<()> {
        if bit > 7 {
            return Err(PlcError::OutOfBounds);
        }
        self.check_bounds(offset, 1)?;
        let mut buf = self.buffer.lock();
        if value {
            buf[offset] |= 1 << bit;
        } else {
            buf[offset] &= !(1 << bit);
        }
        Ok(())
    }
}

macro_rules! typed_accessor {
    ($get:ident, $set:ident, $ty:ty, $width:literal, $from_bytes:ident, $to_bytes:ident) => {
        impl Tag {
            pub fn $get(&self, offset: usize) -> PlcResult<$ty> {
                self.check_bounds(offset, $width)?;
                let buf = self.buffer.lock();
                let mut arr = [0u8; $width];
                arr.copy_from_slice(&buf[offset..offset + $width]);
                Ok(<$ty>::$from_bytes(arr))
            }

            pub fn $set(&self, offset: usize, value: $ty) -> PlcResult<()> {
                self.check_bounds(offset, $width)?;
                let bytes = value.$to_bytes();
                self.buffer.lock()[offset..offset + $width].copy_from_slice(&bytes);
                Ok(())
            }
        }
    };
}

typed_accessor!(get_u16, set_u16, u16, 2, from_le_bytes, to_le_bytes);
typed_accessor!(get_i16, set_i16, i16, 2, from_le_bytes, to_le_bytes);
typed_accessor!(get_u32, set_u32, u32, 4, from_le_bytes, to_le_bytes);
typed_accessor!(get_i32, set_i32, i32, 4, from_le_bytes, to_le_bytes);
typed_accessor!(get_u64, set_u64, u64, 8, from_le_bytes, to_le_bytes);
typed_accessor!(get_i64, set_i64, i64, 8, from_le_bytes, to_le_bytes);
typed_accessor!(get_f32, set_f32, f32, 4, from_le_bytes, to_le_bytes);
typed_accessor!(get_f64, set_f64, f64, 8, from_le_bytes, to_le_bytes);

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tag() -> Arc<Tag> {
        Tag::create("protocol=ab_eip&gateway=127.0.0.1&cpu=lgx&name=MyTag&elem_size=4&elem_count=1").unwrap()
    }

    #[test]
    fn typed_accessors_round_trip() {
        let tag = test_tag();
        tag.set_i32(0, -12345).unwrap();
        assert_eq!(tag.get_i32(0).unwrap(), -12345);
    }

    #[test]
    fn bit_accessors_round_trip() {
        let tag = test_tag();
        tag.set_bit(0, 3, true).unwrap();
        assert!(tag.get_bit(0, 3).unwrap());
        tag.set_bit(0, 3, false).unwrap();
        assert!(!tag.get_bit(0, 3).unwrap());
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let tag = test_tag();
        assert_eq!(tag.get_u64(0).unwrap_err(), PlcError::OutOfBounds);
    }

    #[test]
    fn double_read_without_poll_is_bad_param() {
        let tag = test_tag();
        tag.read().unwrap();
        assert!(matches!(tag.read().unwrap_err(), PlcError::BadParam(_)));
    }
}
