//! Feeds a chunk header and body one byte at a time, confirming the ingress
//! parser tolerates an arbitrarily fragmented arrival instead of assuming a
//! header always lands in a single `read(2)`.

mod common;

use std::io::Write;
use std::time::Duration;

use nio_mux::endpoint::Endpoint;
use nio_mux::{channel_hub, HubConfig, TransportConfig};

use common::{recv_packet, tcp_pair, ChannelReceiver};

#[test]
fn reassembles_a_byte_at_a_time_header_and_body() {
    let (hub, handle) = channel_hub(HubConfig::default()).expect("build hub");
    hub.spawn();

    let (mut raw_client, server_sock) = tcp_pair();

    let server = handle
        .create_transport(
            Endpoint::mono_tcp(server_sock).unwrap(),
            TransportConfig::default(),
        )
        .expect("create server transport");
    let (receiver, rx) = ChannelReceiver::new();
    server.setup(receiver);

    let body = b"a single command trickled in one byte at a time";
    let mut wire = Vec::new();
    wire.push(0x80u8); // last-chunk flag set
    wire.push(body.len() as u8); // length low byte (fits in one byte here)
    wire.extend_from_slice(body);

    std::thread::spawn(move || {
        for byte in wire {
            raw_client.write_all(&[byte]).expect("trickle one byte");
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    let received = recv_packet(&rx, Duration::from_secs(10));
    assert_eq!(received, body);
    nio_mux::ChannelHub::shutdown(&handle);
}
