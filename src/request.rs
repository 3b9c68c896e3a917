//! Per-session Request Store: a small FIFO of in-flight requests, matched
//! to replies by sender context or connection sequence number.

use std::time::Instant;

/// How a pending request's reply should be matched against an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey {
    Unconnected { session_sequence_id: u64 },
    Connected { peer_connection_id: u32, connection_sequence_number: u16 },
}

/// One outstanding request: the bytes to send, and the response bytes once
/// they arrive.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: u64,
    pub match_key: MatchKey,
    pub send_buf: Vec<u8>,
    pub send_offset: usize,
    pub send_in_progress: bool,
    pub send_queued: bool,
    pub recv_in_progress: bool,
    pub response: Option<Vec<u8>>,
    pub abort_requested: bool,
    pub queued_at: Instant,
    /// Non-empty only for a Multiple Service Packet carrier request: the
    /// ids of the original requests whose bodies were bundled into this
    /// one, in wire order, so the reply can be split back out to them.
    pub batch_members: Vec<u64>,
}

impl PendingRequest {
    pub fn new(id: u64, match_key: MatchKey, send_buf: Vec<u8>) -> Self {
        Self {
            id,
            match_key,
            send_buf,
            send_offset: 0,
            send_in_progress: false,
            send_queued: true,
            recv_in_progress: false,
            response: None,
            abort_requested: false,
            queued_at: Instant::now(),
            batch_members: Vec::new(),
        }
    }

    pub fn response_received(&self) -> bool {
        self.response.is_some()
    }

    pub fn remaining_send(&self) -> &[u8] {
        &self.send_buf[self.send_offset..]
    }

    /// A request may be abandoned without waiting for the I/O worker only
    /// while its bytes have not started going out the socket.
    pub fn is_abortable_now(&self) -> bool {
        !self.send_in_progress
    }
}

/// A FIFO of pending requests for one session. Sends happen in the order
/// requests were appended; replies are matched by [`MatchKey`], not by
/// arrival order, since the gateway may reorder responses.
#[derive(Debug, Default)]
pub struct RequestStore {
    requests: Vec<PendingRequest>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self { requests: Vec::new() }
    }

    pub fn append(&mut self, req: PendingRequest) {
        self.requests.push(req);
    }

    pub fn remove(&mut self, id: u64) -> Option<PendingRequest> {
        let idx = self.requests.iter().position(|r| r.id == id)?;
        Some(self.requests.remove(idx))
    }

    pub fn find_by_id(&self, id: u64) -> Option<&PendingRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: u64) -> Option<&mut PendingRequest> {
        self.requests.iter_mut().find(|r| r.id == id)
    }

    /// Finds the request whose match key corresponds to an incoming reply,
    /// per SPEC_FULL.md §4.3.
    pub fn find_by_match(&mut self, key: MatchKey) -> Option<&mut PendingRequest> {
        self.requests.iter_mut().find(|r| r.match_key == key)
    }

    /// The oldest request still waiting to be sent.
    pub fn next_to_send(&mut self) -> Option<&mut PendingRequest> {
        self.requests.iter_mut().find(|r| r.send_queued && !r.send_in_progress)
    }

    /// Ids of up to `max` not-yet-sent unconnected requests, eligible for
    /// Multiple Service Packet batching.
    pub fn packable_candidates(&self, max: usize) -> Vec<u64> {
        self.requests
            .iter()
            .filter(|r| {
                r.send_queued
                    && !r.send_in_progress
                    && r.batch_members.is_empty()
                    && matches!(r.match_key, MatchKey::Unconnected { .. })
            })
            .take(max)
            .map(|r| r.id)
            .collect()
    }

    /// Drops requests that were aborted before their send began.
    pub fn evict_aborted(&mut self) {
        self.requests.retain(|r| !(r.abort_requested && r.is_abortable_now()));
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64, seq: u64) -> PendingRequest {
        PendingRequest::new(id, MatchKey::Unconnected { session_sequence_id: seq }, vec![1, 2, 3])
    }

    #[test]
    fn append_and_find_by_match() {
        let mut store = RequestStore::new();
        store.append(req(1, 100));
        store.append(req(2, 200));
        let found = store.find_by_match(MatchKey::Unconnected { session_sequence_id: 200 }).unwrap();
        assert_eq!(found.id, 2);
    }

    #[test]
    fn evict_aborted_keeps_in_flight_sends() {
        let mut store = RequestStore::new();
        let mut r1 = req(1, 1);
        r1.abort_requested = true;
        let mut r2 = req(2, 2);
        r2.abort_requested = true;
        r2.send_in_progress = true;
        store.append(r1);
        store.append(r2);
        store.evict_aborted();
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_id(2).unwrap().abort_requested, true);
    }

    #[test]
    fn next_to_send_skips_in_progress() {
        let mut store = RequestStore::new();
        let mut r1 = req(1, 1);
        r1.send_in_progress = true;
        store.append(r1);
        store.append(req(2, 2));
        assert_eq!(store.next_to_send().unwrap().id, 2);
    }

    #[test]
    fn packable_candidates_skips_in_flight_and_connected() {
        let mut store = RequestStore::new();
        store.append(req(1, 1));
        let mut sending = req(2, 2);
        sending.send_in_progress = true;
        store.append(sending);
        store.append(PendingRequest::new(
            3,
            MatchKey::Connected { peer_connection_id: 9, connection_sequence_number: 1 },
            vec![],
        ));
        store.append(req(4, 4));
        assert_eq!(store.packable_candidates(8), vec![1, 4]);
    }

    #[test]
    fn remove_returns_owned_request() {
        let mut store = RequestStore::new();
        store.append(req(1, 1));
        let removed = store.remove(1).unwrap();
        assert_eq!(removed.id, 1);
        assert!(store.is_empty());
    }
}
