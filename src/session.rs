//! Session State Machine: owns one TCP socket to a gateway, the Request
//! Store, and the connection-lifecycle counters. Driven by the I/O Handler
//! worker thread; see SPEC_FULL.md §4.4.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::codec::cip::{self, ConnectionParams, ForwardOpenRequest, ForwardOpenVariant};
use crate::codec::cpf::CpfPacket;
use crate::codec::eip::{self, EncapHeader, ENCAP_HEADER_LEN};
use crate::codec::Encoder;
use crate::error::{PlcError, PlcResult};
use crate::path::{EncodedPath, PlcFamily};
use crate::request::{MatchKey, PendingRequest, RequestStore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFF_INITIAL: Duration = Duration::from_millis(50);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Registering,
    Ready,
    Opening,
    Closing,
    Unregistering,
}

/// Identifies a session uniquely within the Registry: gateway endpoint plus
/// the encoded connection path, since two tags with different routes to
/// different end devices must never share a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub host: String,
    pub port: u16,
    pub path_bytes: Vec<u8>,
    pub is_pccc: bool,
}

/// Exponential backoff with full jitter, reset on any successful receive.
#[derive(Debug)]
pub struct Backoff {
    consecutive_failures: u32,
    next_attempt_at: Instant,
}

impl Backoff {
    fn new() -> Self {
        Self { consecutive_failures: 0, next_attempt_at: Instant::now() }
    }

    fn ready(&self, now: Instant) -> bool {
        now >= self.next_attempt_at
    }

    fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let exp = BACKOFF_INITIAL.saturating_mul(1u32 << self.consecutive_failures.min(16));
        let capped = exp.min(BACKOFF_CAP);
        let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64);
        self.next_attempt_at = Instant::now() + Duration::from_millis(jitter_ms);
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.next_attempt_at = Instant::now();
    }
}

/// Forward-Open scope state, present only once a Class-3 connection has
/// been established on this session.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionScope {
    pub orig_to_targ_conn_id: u32,
    pub targ_to_orig_conn_id: u32,
    pub connection_serial_number: u16,
    pub connection_sequence_number: u16,
}

struct Inner {
    state: SessionState,
    socket: Option<TcpStream>,
    recv_accumulator: Vec<u8>,
    requests: RequestStore,
    backoff: Backoff,
    connection: Option<ConnectionScope>,
    idle_since: Instant,
    connection_serial_counter: u16,
    pending_forward_open: Option<u64>,
    pending_forward_close: Option<u64>,
    /// Register-Session/Unregister-Session frame in flight, with the number
    /// of bytes already written. Resumed one non-blocking `write` per tick
    /// rather than looped to completion, so a `WouldBlock` hands control
    /// straight back to the I/O worker instead of spinning on it.
    pending_control_send: Option<(Vec<u8>, usize)>,
}

/// One gateway connection, shared by every tag routed through it.
pub struct Session {
    pub key: SessionKey,
    pub family: PlcFamily,
    pub encoded_path: EncodedPath,
    session_handle: AtomicU32,
    next_sender_context: AtomicU64,
    ref_count: AtomicU32,
    allow_packing: AtomicBool,
    inner: Mutex<Inner>,
}

impl Session {
    pub fn new(key: SessionKey, family: PlcFamily, encoded_path: EncodedPath) -> Self {
        Self {
            key,
            family,
            encoded_path,
            session_handle: AtomicU32::new(0),
            next_sender_context: AtomicU64::new(1),
            ref_count: AtomicU32::new(0),
            allow_packing: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: SessionState::Closed,
                socket: None,
                recv_accumulator: Vec::with_capacity(ENCAP_HEADER_LEN),
                requests: RequestStore::new(),
                backoff: Backoff::new(),
                connection: None,
                idle_since: Instant::now(),
                connection_serial_counter: 0,
                pending_forward_open: None,
                pending_forward_close: None,
                pending_control_send: None,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn handle(&self) -> u32 {
        self.session_handle.load(Ordering::Acquire)
    }

    pub fn connection_scope(&self) -> Option<ConnectionScope> {
        self.inner.lock().connection
    }

    pub fn acquire(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases a reference, returning true if this was the last one.
    pub fn release(&self) -> bool {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Enables Multiple-Service-Packet batching for this session. Sticky:
    /// any tag sharing the session that wants packing turns it on for all.
    pub fn enable_packing(&self) {
        self.allow_packing.store(true, Ordering::Release);
    }

    pub fn allow_packing(&self) -> bool {
        self.allow_packing.load(Ordering::Acquire)
    }

    /// Allocates the next nonzero `sender_context` for an unconnected
    /// request. Zero is reserved, per SPEC_FULL.md §4.3.
    pub fn next_sender_context(&self) -> u64 {
        loop {
            let v = self.next_sender_context.fetch_add(1, Ordering::AcqRel);
            if v != 0 {
                return v;
            }
        }
    }

    pub fn requests(&self) -> parking_lot::MappedMutexGuard<'_, RequestStore> {
        parking_lot::MutexGuard::map(self.inner.lock(), |i| &mut i.requests)
    }

    /// Attempts to open a non-blocking TCP connection. Called by the I/O
    /// worker when the session is `Closed` and backoff allows a retry.
    pub fn try_connect(&self) -> PlcResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Closed {
            return Ok(());
        }
        if !inner.backoff.ready(Instant::now()) {
            return Ok(());
        }
        let addr = resolve_first(&self.key.host, self.key.port)?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| PlcError::BadGateway(format!("connect to {addr} failed: {e}")))?;
        stream.set_nonblocking(true).map_err(io_err)?;
        configure_socket(&stream)?;
        inner.socket = Some(stream);
        inner.state = SessionState::Connecting;
        Ok(())
    }

    /// Advances the Register-Session send by at most one non-blocking
    /// `write` per call, resuming where a prior `WouldBlock` left off.
    /// Transitions to `Registering` only once the whole frame is out.
    pub fn send_register_session(&self) -> PlcResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Connecting {
            return Ok(());
        }
        if inner.pending_control_send.is_none() {
            let sender_context = self.next_sender_context();
            inner.pending_control_send = Some((eip::encode_register_session(sender_context), 0));
        }
        let Inner { socket, pending_control_send, .. } = &mut *inner;
        let socket = socket.as_mut().ok_or_else(|| PlcError::BadConnection("no socket".into()))?;
        if advance_control_send(pending_control_send, socket)? {
            inner.state = SessionState::Registering;
        }
        Ok(())
    }

    /// Processes a decoded Register-Session reply.
    pub fn on_register_reply(&self, header: &EncapHeader) -> PlcResult<()> {
        let mut inner = self.inner.lock();
        if header.command != eip::CMD_REGISTER_SESSION || header.status != 0 {
            inner.state = SessionState::Closed;
            inner.backoff.record_failure();
            return Err(PlcError::RemoteErr(format!(
                "register-session failed with status {}",
                header.status
            )));
        }
        self.session_handle.store(header.session_handle, Ordering::Release);
        inner.backoff.record_success();
        inner.state = SessionState::Ready;
        inner.idle_since = Instant::now();
        Ok(())
    }

    pub fn begin_opening(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Ready {
            inner.state = SessionState::Opening;
        }
    }

    pub fn on_forward_open_reply(&self, scope: Option<ConnectionScope>) {
        let mut inner = self.inner.lock();
        inner.connection = scope;
        inner.state = SessionState::Ready;
    }

    pub fn begin_closing(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Ready {
            inner.state = SessionState::Closing;
        }
    }

    pub fn on_forward_close_done(&self) {
        let mut inner = self.inner.lock();
        inner.connection = None;
        inner.state = SessionState::Unregistering;
    }

    /// Moves a `Ready` session toward teardown: through `Closing` if a CIP
    /// connection is open, straight to `Unregistering` otherwise. Called by
    /// the Registry once a session's last tag reference is released.
    pub fn begin_teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Ready {
            return;
        }
        inner.state =
            if inner.connection.is_some() { SessionState::Closing } else { SessionState::Unregistering };
    }

    /// Wraps a CIP request body in an unconnected EIP frame (Send-RR-Data).
    /// `sender_context` becomes both the frame's correlation token and the
    /// request's [`MatchKey`] so the I/O Handler can pair up the reply.
    pub fn frame_unconnected(&self, cip_body: Vec<u8>, sender_context: u64) -> Vec<u8> {
        let payload = CpfPacket::unconnected(0, cip_body).encode();
        let mut enc = Encoder::with_capacity(ENCAP_HEADER_LEN + payload.len());
        EncapHeader::new(eip::CMD_SEND_RR_DATA, payload.len() as u16, self.handle(), sender_context)
            .encode(&mut enc);
        enc.bytes(&payload);
        enc.into_vec()
    }

    /// Wraps a CIP request body in a connected EIP frame (Send-Unit-Data)
    /// over this session's established Class-3 connection, advancing its
    /// connection sequence number. Errs if no connection is open.
    pub fn frame_connected(&self, cip_body: Vec<u8>) -> PlcResult<(Vec<u8>, MatchKey)> {
        let (conn_id, seq) = {
            let mut inner = self.inner.lock();
            let scope = inner
                .connection
                .as_mut()
                .ok_or_else(|| PlcError::BadConnection("no CIP connection established".into()))?;
            scope.connection_sequence_number = scope.connection_sequence_number.wrapping_add(1);
            (scope.orig_to_targ_conn_id, scope.connection_sequence_number)
        };
        let payload = CpfPacket::connected(0, conn_id, seq, cip_body).encode();
        let mut enc = Encoder::with_capacity(ENCAP_HEADER_LEN + payload.len());
        EncapHeader::new(
            eip::CMD_SEND_UNIT_DATA,
            payload.len() as u16,
            self.handle(),
            self.next_sender_context(),
        )
        .encode(&mut enc);
        enc.bytes(&payload);
        let match_key =
            MatchKey::Connected { peer_connection_id: conn_id, connection_sequence_number: seq };
        Ok((enc.into_vec(), match_key))
    }

    /// Queues a Forward Open request if this session is `Opening` and none
    /// is already in flight. Idempotent; safe to call every I/O tick.
    pub fn queue_forward_open(&self) {
        let serial = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Opening || inner.pending_forward_open.is_some() {
                return;
            }
            inner.connection_serial_counter = inner.connection_serial_counter.wrapping_add(1);
            inner.connection_serial_counter
        };

        let params = ConnectionParams {
            size_bytes: 500,
            fixed_size: true,
            priority: 0,
            connection_type: 2,
            redundant_owner: false,
        };
        let req = ForwardOpenRequest {
            variant: ForwardOpenVariant::Standard,
            connection_serial_number: serial,
            orig_to_targ_conn_id: 0,
            targ_to_orig_conn_id: 0,
            timeout_multiplier: 1,
            orig_to_targ_rpi_us: 2_000_000,
            orig_to_targ_params: params,
            targ_to_orig_rpi_us: 2_000_000,
            targ_to_orig_params: params,
            connection_path: self.encoded_path.bytes.clone(),
        };
        let body = cip::encode_forward_open(&req);
        let sender_context = self.next_sender_context();
        let frame = self.frame_unconnected(body, sender_context);
        let match_key = MatchKey::Unconnected { session_sequence_id: sender_context };
        self.requests().append(PendingRequest::new(sender_context, match_key, frame));
        self.inner.lock().pending_forward_open = Some(sender_context);
    }

    pub fn pending_forward_open_id(&self) -> Option<u64> {
        self.inner.lock().pending_forward_open
    }

    pub fn clear_pending_forward_open(&self) {
        self.inner.lock().pending_forward_open = None;
    }

    /// Queues a Forward Close request if this session is `Closing` and none
    /// is already in flight. If no connection was ever established, skips
    /// straight to the `Unregistering` transition.
    pub fn queue_forward_close(&self) {
        let scope = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Closing || inner.pending_forward_close.is_some() {
                return;
            }
            match inner.connection {
                Some(scope) => scope,
                None => {
                    drop(inner);
                    self.on_forward_close_done();
                    return;
                }
            }
        };
        let body = cip::encode_forward_close(scope.connection_serial_number, &self.encoded_path.bytes);
        let sender_context = self.next_sender_context();
        let frame = self.frame_unconnected(body, sender_context);
        let match_key = MatchKey::Unconnected { session_sequence_id: sender_context };
        self.requests().append(PendingRequest::new(sender_context, match_key, frame));
        self.inner.lock().pending_forward_close = Some(sender_context);
    }

    pub fn pending_forward_close_id(&self) -> Option<u64> {
        self.inner.lock().pending_forward_close
    }

    pub fn clear_pending_forward_close(&self) {
        self.inner.lock().pending_forward_close = None;
    }

    /// Advances the Unregister-Session send by at most one non-blocking
    /// `write` per call, then tears the socket down once it lands (or once
    /// it fails outright, since the socket is going away regardless).
    pub fn finish_unregistering(&self) {
        let mut inner = self.inner.lock();
        if inner.socket.is_none() {
            inner.state = SessionState::Closed;
            self.session_handle.store(0, Ordering::Release);
            return;
        }
        if inner.pending_control_send.is_none() {
            let sender_context = self.next_sender_context();
            let handle = self.handle();
            inner.pending_control_send = Some((eip::encode_unregister_session(handle, sender_context), 0));
        }
        let Inner { socket, pending_control_send, .. } = &mut *inner;
        let socket = socket.as_mut().expect("checked for None above");
        let done = match advance_control_send(pending_control_send, socket) {
            Ok(done) => done,
            Err(e) => {
                tracing::debug!(error = %e, "unregister-session send failed, closing anyway");
                true
            }
        };
        if done {
            inner.socket = None;
            inner.state = SessionState::Closed;
            self.session_handle.store(0, Ordering::Release);
        }
    }

    /// Aborts every in-flight request and resets to `Closed` with backoff,
    /// per the "any state -> unrecoverable socket error" transition. The
    /// dropped requests surface `BAD_CONNECTION` to their tags because the
    /// I/O Handler finds no matching entry left in the store and treats
    /// that as connection loss.
    pub fn fail_and_reset(&self, reason: &str) {
        let mut inner = self.inner.lock();
        inner.socket = None;
        inner.connection = None;
        inner.recv_accumulator.clear();
        inner.requests = RequestStore::new();
        inner.pending_forward_open = None;
        inner.pending_forward_close = None;
        inner.pending_control_send = None;
        inner.backoff.record_failure();
        inner.state = SessionState::Closed;
        self.session_handle.store(0, Ordering::Release);
        tracing::warn!(session = ?self.key, reason, "session reset after unrecoverable error");
    }

    pub fn with_socket_and_accumulator<R>(
        &self,
        f: impl FnOnce(&mut TcpStream, &mut Vec<u8>) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.lock();
        let state_ok = inner.state != SessionState::Closed;
        if !state_ok {
            return None;
        }
        let (socket, accumulator) = {
            let inner_ref = &mut *inner;
            (inner_ref.socket.as_mut()?, &mut inner_ref.recv_accumulator)
        };
        Some(f(socket, accumulator))
    }

    pub fn mark_idle_if_empty(&self) {
        let mut inner = self.inner.lock();
        if inner.requests.is_empty() {
            inner.idle_since = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.inner.lock().idle_since.elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("handle", &self.handle())
            .finish()
    }
}

fn resolve_first(host: &str, port: u16) -> PlcResult<SocketAddr> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|e| PlcError::BadDevice(format!("DNS resolution for '{host}' failed: {e}")))?
        .next()
        .ok_or_else(|| PlcError::BadDevice(format!("no addresses found for '{host}'")))
}

fn configure_socket(stream: &TcpStream) -> PlcResult<()> {
    use socket2::{SockRef, TcpKeepalive};
    let sock_ref = SockRef::from(stream);
    sock_ref.set_reuse_address(true).map_err(io_err)?;
    sock_ref.set_read_timeout(Some(SOCKET_TIMEOUT)).map_err(io_err)?;
    sock_ref.set_write_timeout(Some(SOCKET_TIMEOUT)).map_err(io_err)?;
    sock_ref.set_linger(Some(Duration::from_secs(0))).map_err(io_err)?;
    let _ = sock_ref.set_tcp_keepalive(&TcpKeepalive::new());
    Ok(())
}

fn io_err(e: io::Error) -> PlcError {
    PlcError::BadConnection(format!("socket setup failed: {e}"))
}

/// Advances a partial control-frame send by exactly one non-blocking
/// `write` attempt - never loops on `WouldBlock`, so the I/O worker always
/// regains control within one tick. Returns `true` once the whole buffer
/// has gone out (and clears `pending`), `false` if the caller should try
/// again on a later tick.
fn advance_control_send(pending: &mut Option<(Vec<u8>, usize)>, socket: &mut TcpStream) -> PlcResult<bool> {
    let Some((buf, offset)) = pending else { return Ok(true) };
    match socket.write(&buf[*offset..]) {
        Ok(0) => Err(PlcError::Write("socket closed mid-write".into())),
        Ok(n) => {
            *offset += n;
            let done = *offset >= buf.len();
            if done {
                *pending = None;
            }
            Ok(done)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(PlcError::Write(format!("{e}"))),
    }
}

/// Reads whatever is currently available without blocking. Returns the
/// number of bytes read, or `Ok(0)` on a `WouldBlock`.
pub fn read_nonblocking(socket: &mut TcpStream, buf: &mut [u8]) -> PlcResult<usize> {
    match socket.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(PlcError::BadConnection(format!("{e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_resets() {
        let mut b = Backoff::new();
        assert!(b.ready(Instant::now()));
        b.record_failure();
        assert!(b.next_attempt_at >= Instant::now());
        b.record_success();
        assert_eq!(b.consecutive_failures, 0);
    }

    #[test]
    fn sender_context_never_zero() {
        let key = SessionKey { host: "127.0.0.1".into(), port: 44818, path_bytes: vec![], is_pccc: false };
        let session = Session::new(key, PlcFamily::ControlLogix, EncodedPath { bytes: vec![], dhp_dest_node: None });
        session.next_sender_context.store(u64::MAX, Ordering::Release);
        assert_ne!(session.next_sender_context(), 0);
    }

    #[test]
    fn ref_counting() {
        let key = SessionKey { host: "x".into(), port: 1, path_bytes: vec![], is_pccc: false };
        let session = Session::new(key, PlcFamily::Plc5, EncodedPath { bytes: vec![], dhp_dest_node: None });
        session.acquire();
        session.acquire();
        assert!(!session.release());
        assert!(session.release());
    }
}
