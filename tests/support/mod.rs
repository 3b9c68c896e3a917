//! A minimal in-process EtherNet/IP gateway stand-in for integration tests.
//! Handles the Register-Session handshake automatically, then lets the
//! caller supply a CIP-request-to-CIP-reply function for whatever it wants
//! to exercise next.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use ab_eip::codec::cip;
use ab_eip::codec::cpf::CpfPacket;
use ab_eip::codec::eip::{self, EncapHeader, ENCAP_HEADER_LEN};

pub struct MockGateway {
    listener: TcpListener,
}

impl MockGateway {
    /// Binds an ephemeral local port and returns it alongside the gateway,
    /// ready for [`MockGateway::serve_one`] to be run on a background thread.
    pub fn bind() -> (Self, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().unwrap().port();
        (Self { listener }, port)
    }

    /// Accepts a single connection, completes Register-Session, then answers
    /// every unconnected CIP request it receives by running it through
    /// `responder` until the peer disconnects.
    pub fn serve(self, mut responder: impl FnMut(&[u8]) -> Vec<u8>) {
        let (mut stream, _) = self.listener.accept().expect("accept connection");
        let session_handle = 0x1234_5678;

        let register_req = read_frame(&mut stream);
        assert_eq!(register_req.0.command, eip::CMD_REGISTER_SESSION);
        let reply = eip_frame(eip::CMD_REGISTER_SESSION, session_handle, register_req.0.sender_context, &[1, 0, 0, 0]);
        stream.write_all(&reply).expect("write register-session reply");

        loop {
            let Some((header, payload)) = try_read_frame(&mut stream) else { break };
            if header.command != eip::CMD_SEND_RR_DATA {
                continue;
            }
            let cpf = CpfPacket::decode(&payload).expect("decode CPF request");
            let cip_request = cpf.cip_data().expect("CPF carries CIP data").to_vec();
            let cip_reply = responder(&cip_request);
            let reply_payload = CpfPacket::unconnected(0, cip_reply).encode();
            let frame = eip_frame(eip::CMD_SEND_RR_DATA, session_handle, header.sender_context, &reply_payload);
            stream.write_all(&frame).expect("write data reply");
        }
    }

    /// Like [`MockGateway::serve`], but understands the Class-3 connection
    /// handshake: a Forward Open gets a canned pair of connection ids, the
    /// CIP requests that follow arrive over Send-Unit-Data and are answered
    /// by `responder` on that connection, and the eventual Forward Close is
    /// acknowledged before the peer tears the session down.
    pub fn serve_connected(self, mut responder: impl FnMut(&[u8]) -> Vec<u8>) {
        let (mut stream, _) = self.listener.accept().expect("accept connection");
        let session_handle = 0x1234_5678;
        let orig_to_targ_conn_id = 0xAAAA_BBBB;
        let targ_to_orig_conn_id = 0xCCCC_DDDD;

        let register_req = read_frame(&mut stream);
        assert_eq!(register_req.0.command, eip::CMD_REGISTER_SESSION);
        let reply = eip_frame(eip::CMD_REGISTER_SESSION, session_handle, register_req.0.sender_context, &[1, 0, 0, 0]);
        stream.write_all(&reply).expect("write register-session reply");

        loop {
            let Some((header, payload)) = try_read_frame(&mut stream) else { break };
            let cpf = CpfPacket::decode(&payload).expect("decode CPF request");
            let cip_request = cpf.cip_data().expect("CPF carries CIP data").to_vec();

            match header.command {
                eip::CMD_SEND_RR_DATA if cip_request[0] == cip::SERVICE_FORWARD_OPEN => {
                    let cip_reply = forward_open_reply(orig_to_targ_conn_id, targ_to_orig_conn_id);
                    let reply_payload = CpfPacket::unconnected(0, cip_reply).encode();
                    let frame =
                        eip_frame(eip::CMD_SEND_RR_DATA, session_handle, header.sender_context, &reply_payload);
                    stream.write_all(&frame).expect("write forward-open reply");
                }
                eip::CMD_SEND_RR_DATA if cip_request[0] == cip::SERVICE_FORWARD_CLOSE => {
                    let cip_reply = vec![cip::SERVICE_FORWARD_CLOSE | cip::SERVICE_REPLY_BIT, 0, 0, 0];
                    let reply_payload = CpfPacket::unconnected(0, cip_reply).encode();
                    let frame =
                        eip_frame(eip::CMD_SEND_RR_DATA, session_handle, header.sender_context, &reply_payload);
                    stream.write_all(&frame).expect("write forward-close reply");
                }
                eip::CMD_SEND_UNIT_DATA => {
                    let seq = cpf
                        .connection_sequence_number()
                        .expect("send-unit-data carries a connection sequence number");
                    let cip_reply = responder(&cip_request);
                    let reply_payload =
                        CpfPacket::connected(0, orig_to_targ_conn_id, seq, cip_reply).encode();
                    let frame =
                        eip_frame(eip::CMD_SEND_UNIT_DATA, session_handle, header.sender_context, &reply_payload);
                    stream.write_all(&frame).expect("write connected data reply");
                }
                _ => {}
            }
        }
    }
}

/// Builds a successful Forward Open reply body, per
/// [`cip::decode_forward_open_reply`]'s layout.
fn forward_open_reply(orig_to_targ_conn_id: u32, targ_to_orig_conn_id: u32) -> Vec<u8> {
    let mut body = vec![cip::SERVICE_FORWARD_OPEN | cip::SERVICE_REPLY_BIT, 0, 0, 0];
    body.extend_from_slice(&orig_to_targ_conn_id.to_le_bytes());
    body.extend_from_slice(&targ_to_orig_conn_id.to_le_bytes());
    body.extend_from_slice(&0x4242u16.to_le_bytes()); // connection_serial_number
    body.extend_from_slice(&cip::ORIGINATOR_VENDOR_ID.to_le_bytes());
    body.extend_from_slice(&cip::ORIGINATOR_SERIAL_NUMBER.to_le_bytes());
    body.extend_from_slice(&2_000_000u32.to_le_bytes()); // orig_to_targ_api_us
    body.extend_from_slice(&2_000_000u32.to_le_bytes()); // targ_to_orig_api_us
    body.push(0); // application reply size, in words
    body.push(0); // reserved
    body
}

fn eip_frame(command: u16, session_handle: u32, sender_context: u64, payload: &[u8]) -> Vec<u8> {
    let mut enc = ab_eip::codec::Encoder::with_capacity(ENCAP_HEADER_LEN + payload.len());
    EncapHeader::new(command, payload.len() as u16, session_handle, sender_context).encode(&mut enc);
    enc.bytes(payload);
    enc.into_vec()
}

fn read_frame(stream: &mut TcpStream) -> (EncapHeader, Vec<u8>) {
    try_read_frame(stream).expect("peer closed before sending a full frame")
}

fn try_read_frame(stream: &mut TcpStream) -> Option<(EncapHeader, Vec<u8>)> {
    let mut header_buf = [0u8; ENCAP_HEADER_LEN];
    stream.read_exact(&mut header_buf).ok()?;
    let (header, _) = eip::decode_frame(&header_buf).ok()?;
    let mut payload = vec![0u8; header.payload_length as usize];
    stream.read_exact(&mut payload).ok()?;
    Some((header, payload))
}

/// Builds a successful CIP Read Tag reply body for a DINT value.
pub fn cip_read_tag_reply(value: i32) -> Vec<u8> {
    let mut body = vec![cip::SERVICE_READ_TAG | cip::SERVICE_REPLY_BIT, 0, 0, 0];
    body.extend_from_slice(&0x00C4u16.to_le_bytes());
    body.extend_from_slice(&value.to_le_bytes());
    body
}

/// Builds a successful CIP Write Tag reply body (no data, status ok).
pub fn cip_write_tag_reply() -> Vec<u8> {
    vec![cip::SERVICE_WRITE_TAG | cip::SERVICE_REPLY_BIT, 0, 0, 0]
}
