//! Single cooperative I/O worker thread: drives every session's socket
//! and request store, and ticks the Tag Coordinator. See SPEC_FULL.md §4.6.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use crate::codec::cip;
use crate::codec::cpf::CpfPacket;
use crate::codec::eip::{self, EncapHeader, ENCAP_HEADER_LEN};
use crate::codec::Encoder;
use crate::error::PlcResult;
use crate::registry;
use crate::request::{MatchKey, PendingRequest};
use crate::session::{read_nonblocking, ConnectionScope, Session, SessionState};
use crate::tag::Tag;

const IDLE_SLEEP: Duration = Duration::from_millis(1);
/// Upper bound on how many tag requests get bundled into one Multiple
/// Service Packet, to keep the combined frame within classic CIP payload
/// limits (504 bytes) with margin for small tag bodies.
const MAX_PACKED_REQUESTS: usize = 8;

struct Worker {
    running: AtomicBool,
    tags: Mutex<Vec<std::sync::Weak<Tag>>>,
}

fn worker() -> &'static Worker {
    static WORKER: OnceLock<Worker> = OnceLock::new();
    WORKER.get_or_init(|| Worker { running: AtomicBool::new(false), tags: Mutex::new(Vec::new()) })
}

/// Registers a tag with the global worker so its state machine is ticked
/// on every I/O Handler pass.
pub fn register_tag(tag: &Arc<Tag>) {
    worker().tags.lock().push(Arc::downgrade(tag));
    ensure_started();
}

fn ensure_started() {
    let w = worker();
    if w.running.swap(true, Ordering::AcqRel) {
        return;
    }
    std::thread::Builder::new()
        .name("ab-eip-io".to_string())
        .spawn(run_loop)
        .expect("failed to spawn I/O worker thread");
}

fn run_loop() {
    loop {
        let made_progress = tick();
        if !made_progress {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

/// Runs one pass over every session and every tag. Returns whether any
/// session made forward progress, for the caller's idle-sleep decision.
fn tick() -> bool {
    let mut progress = false;
    for session in registry::snapshot() {
        progress |= tick_session(&session);
    }
    let tags: Vec<Arc<Tag>> = worker().tags.lock().iter().filter_map(|w| w.upgrade()).collect();
    worker().tags.lock().retain(|w| w.strong_count() > 0);
    for tag in tags {
        if let Err(e) = tag.step() {
            tracing::debug!(error = %e, "tag coordinator step failed");
        }
    }
    registry::prune_closed();
    progress
}

fn tick_session(session: &Arc<Session>) -> bool {
    match session.state() {
        SessionState::Closed => {
            if let Err(e) = session.try_connect() {
                tracing::debug!(error = %e, session = ?session.key, "connect attempt failed");
                return false;
            }
            session.state() != SessionState::Closed
        }
        SessionState::Connecting => {
            if let Err(e) = session.send_register_session() {
                tracing::warn!(error = %e, "failed to send register-session");
                session.fail_and_reset("register-session send failed");
            }
            true
        }
        SessionState::Registering => tick_recv(session, handle_register_reply),
        SessionState::Ready => {
            let mut progress = tick_recv(session, handle_data_reply);
            progress |= tick_pack(session);
            progress |= tick_send(session);
            session.requests().evict_aborted();
            progress
        }
        SessionState::Opening => {
            session.queue_forward_open();
            let mut progress = tick_recv(session, handle_data_reply);
            progress |= tick_send(session);
            progress |= check_forward_open_done(session);
            session.requests().evict_aborted();
            progress
        }
        SessionState::Closing => {
            session.queue_forward_close();
            let mut progress = tick_recv(session, handle_data_reply);
            progress |= tick_send(session);
            progress |= check_forward_close_done(session);
            session.requests().evict_aborted();
            progress
        }
        SessionState::Unregistering => {
            session.finish_unregistering();
            true
        }
    }
}

/// Checks whether a queued Forward Open's reply has arrived; if so, decodes
/// it and transitions the session back to `Ready`, with or without a
/// connection scope depending on success.
fn check_forward_open_done(session: &Arc<Session>) -> bool {
    let Some(id) = session.pending_forward_open_id() else { return false };
    let response = {
        let mut requests = session.requests();
        match requests.find_by_id(id) {
            Some(r) if r.response_received() => {}
            _ => return false,
        }
        requests.remove(id).and_then(|r| r.response)
    };
    let Some(frame) = response else { return false };
    session.clear_pending_forward_open();
    match parse_forward_open_reply(&frame) {
        Ok(scope) => session.on_forward_open_reply(Some(scope)),
        Err(e) => {
            tracing::warn!(error = %e, "forward open rejected by gateway");
            session.fail_and_reset("forward open rejected");
        }
    }
    true
}

fn parse_forward_open_reply(frame: &[u8]) -> PlcResult<ConnectionScope> {
    let (_header, payload) = eip::decode_frame(frame)?;
    let cpf = CpfPacket::decode(payload)?;
    let (reply_header, body) = cip::decode_reply_header(cpf.cip_data()?)?;
    reply_header.ok()?;
    let reply = cip::decode_forward_open_reply(body)?;
    Ok(ConnectionScope {
        orig_to_targ_conn_id: reply.orig_to_targ_conn_id,
        targ_to_orig_conn_id: reply.targ_to_orig_conn_id,
        connection_serial_number: reply.connection_serial_number,
        connection_sequence_number: 0,
    })
}

/// Checks whether a queued Forward Close's reply has arrived; if so,
/// transitions the session on toward `Unregistering` regardless of the
/// close outcome, since the socket is going away either way.
fn check_forward_close_done(session: &Arc<Session>) -> bool {
    let Some(id) = session.pending_forward_close_id() else { return false };
    let response = {
        let mut requests = session.requests();
        match requests.find_by_id(id) {
            Some(r) if r.response_received() => {}
            _ => return false,
        }
        requests.remove(id).and_then(|r| r.response)
    };
    let Some(frame) = response else { return false };
    session.clear_pending_forward_close();
    if let Err(e) = parse_forward_close_reply(&frame) {
        tracing::warn!(error = %e, "forward close rejected by gateway");
    }
    session.on_forward_close_done();
    true
}

fn parse_forward_close_reply(frame: &[u8]) -> PlcResult<()> {
    let (_header, payload) = eip::decode_frame(frame)?;
    let cpf = CpfPacket::decode(payload)?;
    let (reply_header, _body) = cip::decode_reply_header(cpf.cip_data()?)?;
    reply_header.ok()
}

/// Bundles multiple not-yet-sent unconnected tag requests into a single
/// Multiple Service Packet when the session has packing enabled, per
/// SPEC_FULL.md §4.2. PCCC families tunnel a different command batching
/// scheme and are left untouched.
fn tick_pack(session: &Arc<Session>) -> bool {
    if !session.allow_packing() || session.family.is_pccc() {
        return false;
    }
    let candidate_ids = session.requests().packable_candidates(MAX_PACKED_REQUESTS);
    if candidate_ids.len() < 2 {
        return false;
    }

    let mut members = Vec::with_capacity(candidate_ids.len());
    let mut sub_requests = Vec::with_capacity(candidate_ids.len());
    {
        let requests = session.requests();
        for &id in &candidate_ids {
            let Some(req) = requests.find_by_id(id) else { continue };
            match extract_cip_request_body(&req.send_buf) {
                Ok(body) => {
                    members.push(id);
                    sub_requests.push(body);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unpackable request");
                }
            }
        }
    }
    if members.len() < 2 {
        return false;
    }

    let combined_body = cip::encode_multiple_service_packet(&sub_requests);
    let sender_context = session.next_sender_context();
    let frame = session.frame_unconnected(combined_body, sender_context);

    let mut requests = session.requests();
    for &id in &members {
        if let Some(req) = requests.find_by_id_mut(id) {
            req.send_queued = false;
            req.recv_in_progress = true;
        }
    }
    let mut carrier =
        PendingRequest::new(sender_context, MatchKey::Unconnected { session_sequence_id: sender_context }, frame);
    carrier.batch_members = members;
    requests.append(carrier);
    true
}

/// Extracts the raw CIP request body (service + path + body) from an
/// already EIP/CPF-framed outgoing request, for repacking into a batch.
fn extract_cip_request_body(frame: &[u8]) -> PlcResult<Vec<u8>> {
    let (_header, payload) = eip::decode_frame(frame)?;
    let cpf = CpfPacket::decode(payload)?;
    Ok(cpf.cip_data()?.to_vec())
}

/// Splits a received Multiple Service Packet reply back into its member
/// requests' responses, wrapping each sub-reply in a synthetic EIP/CPF
/// frame so [`crate::tag::Tag`]'s reply handling can unwrap it exactly as
/// it would an individually-sent reply.
fn distribute_batch_reply(session: &Arc<Session>, members: &[u64], frame: &[u8]) {
    let sub_replies = match decode_batch_sub_replies(frame) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "malformed multiple service packet reply");
            return;
        }
    };
    if sub_replies.len() != members.len() {
        tracing::warn!(
            expected = members.len(),
            got = sub_replies.len(),
            "multiple service packet reply count mismatch"
        );
        return;
    }
    let mut requests = session.requests();
    for (&id, sub_body) in members.iter().zip(sub_replies.iter()) {
        if let Some(req) = requests.find_by_id_mut(id) {
            req.response = Some(wrap_cip_reply_as_frame(sub_body));
            req.recv_in_progress = false;
        }
    }
}

fn decode_batch_sub_replies(frame: &[u8]) -> PlcResult<Vec<Vec<u8>>> {
    let (_header, payload) = eip::decode_frame(frame)?;
    let cpf = CpfPacket::decode(payload)?;
    let (reply_header, body) = cip::decode_reply_header(cpf.cip_data()?)?;
    reply_header.ok()?;
    let replies = cip::decode_multiple_service_packet(body)?;
    Ok(replies.into_iter().map(|s| s.to_vec()).collect())
}

fn wrap_cip_reply_as_frame(cip_reply: &[u8]) -> Vec<u8> {
    let cpf_payload = CpfPacket::unconnected(0, cip_reply.to_vec()).encode();
    let mut enc = Encoder::with_capacity(ENCAP_HEADER_LEN + cpf_payload.len());
    EncapHeader::new(eip::CMD_SEND_RR_DATA, cpf_payload.len() as u16, 0, 0).encode(&mut enc);
    enc.bytes(&cpf_payload);
    enc.into_vec()
}

fn handle_register_reply(session: &Arc<Session>, frame: &[u8]) {
    match eip::decode_frame(frame) {
        Ok((header, _payload)) => {
            if let Err(e) = session.on_register_reply(&header) {
                tracing::warn!(error = %e, "register-session rejected by gateway");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed register-session reply");
            session.fail_and_reset("malformed register-session reply");
        }
    }
}

fn handle_data_reply(session: &Arc<Session>, frame: &[u8]) {
    let (header, payload) = match eip::decode_frame(frame) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "malformed EIP frame");
            return;
        }
    };
    let cpf = match CpfPacket::decode(payload) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "malformed CPF packet");
            return;
        }
    };
    let match_key = match (cpf.connection_id(), cpf.connection_sequence_number()) {
        (Some(conn_id), Some(seq)) => {
            MatchKey::Connected { peer_connection_id: conn_id, connection_sequence_number: seq }
        }
        _ => MatchKey::Unconnected { session_sequence_id: header.sender_context },
    };
    let mut requests = session.requests();
    if let Some(req) = requests.find_by_match(match_key) {
        if req.abort_requested {
            let id = req.id;
            drop(requests);
            session.requests().remove(id);
            return;
        }
        if !req.batch_members.is_empty() {
            let carrier_id = req.id;
            let members = req.batch_members.clone();
            drop(requests);
            distribute_batch_reply(session, &members, frame);
            session.requests().remove(carrier_id);
            return;
        }
        req.response = Some(frame.to_vec());
        req.recv_in_progress = false;
    }
}

/// Reads whatever is available for a session, and when a full frame has
/// accumulated, hands it to `on_frame` and resets the accumulator.
fn tick_recv(session: &Arc<Session>, on_frame: impl FnOnce(&Arc<Session>, &[u8])) -> bool {
    let read_result = session.with_socket_and_accumulator(|socket, accumulator| {
        let mut scratch = [0u8; 4096];
        match read_nonblocking(socket, &mut scratch) {
            Ok(0) => Ok(false),
            Ok(n) => {
                accumulator.extend_from_slice(&scratch[..n]);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    });

    let read_something = match read_result {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            session.fail_and_reset(&format!("socket read error: {e}"));
            return true;
        }
        None => false,
    };

    let frame = session.with_socket_and_accumulator(|_socket, accumulator| {
        if accumulator.len() < ENCAP_HEADER_LEN {
            return None;
        }
        let payload_len = u16::from_le_bytes([accumulator[2], accumulator[3]]) as usize;
        let total_len = ENCAP_HEADER_LEN + payload_len;
        if accumulator.len() < total_len {
            return None;
        }
        let frame = accumulator[..total_len].to_vec();
        accumulator.drain(..total_len);
        Some(frame)
    });

    if let Some(Some(frame)) = frame {
        on_frame(session, &frame);
        return true;
    }
    read_something
}

fn tick_send(session: &Arc<Session>) -> bool {
    let next = {
        let mut requests = session.requests();
        requests.next_to_send().map(|r| (r.id, r.remaining_send().to_vec()))
    };
    let Some((id, remaining)) = next else { return false };
    if remaining.is_empty() {
        let mut requests = session.requests();
        if let Some(req) = requests.find_by_id_mut(id) {
            req.send_queued = false;
            req.recv_in_progress = true;
        }
        return true;
    }

    let write_result = session.with_socket_and_accumulator(|socket, _acc| {
        use std::io::Write;
        match socket.write(&remaining) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    });

    match write_result {
        Some(Ok(n)) => {
            let mut requests = session.requests();
            if let Some(req) = requests.find_by_id_mut(id) {
                req.send_in_progress = true;
                req.send_offset += n;
                if req.send_offset >= req.send_buf.len() {
                    req.send_queued = false;
                    req.send_in_progress = false;
                    req.recv_in_progress = true;
                }
            }
            n > 0
        }
        Some(Err(e)) => {
            session.fail_and_reset(&format!("socket write error: {e}"));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_starts_lazily_and_only_once() {
        ensure_started();
        let w = worker();
        assert!(w.running.load(Ordering::Acquire));
    }
}
