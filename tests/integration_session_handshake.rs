//! End-to-end exercise of `Tag::create`/`read`/`write` against an in-process
//! mock EtherNet/IP gateway, driving the real `Session`/`io_handler` stack
//! instead of unit-testing its internals directly.

mod support;

use std::thread;
use std::time::{Duration, Instant};

use ab_eip::tag::Tag;

use support::{cip_read_tag_reply, cip_write_tag_reply, MockGateway};

use ab_eip::codec::cip;

fn wait_for_tag(tag: &Tag, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match tag.status() {
            Ok(Some(())) => return,
            Ok(None) => {
                assert!(Instant::now() < deadline, "operation did not complete in time");
                thread::sleep(Duration::from_millis(2));
            }
            Err(e) => panic!("operation failed: {e}"),
        }
    }
}

#[test]
fn reads_a_dint_tag_over_an_unconnected_session() {
    let (gateway, port) = MockGateway::bind();
    let server = thread::spawn(move || {
        gateway.serve(|_request| cip_read_tag_reply(42));
    });

    let attrs = format!(
        "protocol=ab_eip&gateway=127.0.0.1&gateway_port={port}&cpu=lgx&name=MyTag&elem_size=4&use_connected_msg=false"
    );
    let tag = Tag::create(&attrs).expect("tag creation");
    tag.read().expect("queue read");
    wait_for_tag(&tag, Duration::from_secs(2));

    let value = tag.with_buffer(|b| i32::from_le_bytes(b[..4].try_into().unwrap()));
    assert_eq!(value, 42);

    server.join().expect("mock gateway thread panicked");
}

#[test]
fn writes_a_dint_tag_over_an_unconnected_session() {
    let (gateway, port) = MockGateway::bind();
    let server = thread::spawn(move || {
        gateway.serve(|_request| cip_write_tag_reply());
    });

    let attrs = format!(
        "protocol=ab_eip&gateway=127.0.0.1&gateway_port={port}&cpu=lgx&name=MyTag&elem_size=4&use_connected_msg=false"
    );
    let tag = Tag::create(&attrs).expect("tag creation");
    tag.with_buffer_mut(|b| {
        b.resize(4, 0);
        b.copy_from_slice(&99i32.to_le_bytes());
    });
    tag.write().expect("queue write");
    wait_for_tag(&tag, Duration::from_secs(2));

    server.join().expect("mock gateway thread panicked");
}

/// Exercises the Class-3 connected path end to end: Forward Open, a
/// Send-Unit-Data read over the resulting connection, then Forward Close on
/// teardown. A wrong timeout-ticks byte or a busted connection-id handshake
/// in the Forward Open request would make the gateway never see a
/// Send-Unit-Data frame at all, so this catches defects the unconnected
/// tests above cannot.
#[test]
fn reads_a_dint_tag_over_a_connected_session() {
    let (gateway, port) = MockGateway::bind();
    let server = thread::spawn(move || {
        gateway.serve_connected(|request| {
            assert_eq!(request[0], cip::SERVICE_READ_TAG);
            cip_read_tag_reply(7)
        });
    });

    let attrs =
        format!("protocol=ab_eip&gateway=127.0.0.1&gateway_port={port}&cpu=lgx&name=MyTag&elem_size=4");
    let tag = Tag::create(&attrs).expect("tag creation");
    tag.read().expect("queue read");
    wait_for_tag(&tag, Duration::from_secs(2));

    let value = tag.with_buffer(|b| i32::from_le_bytes(b[..4].try_into().unwrap()));
    assert_eq!(value, 7);

    drop(tag);
    server.join().expect("mock gateway thread panicked");
}
