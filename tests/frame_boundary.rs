//! Drives 1024 packets of varying sizes straddling a deliberately small
//! frame size, so most of them span more than one chunk and some land
//! exactly on a chunk boundary.

mod common;

use std::time::Duration;

use nio_mux::endpoint::Endpoint;
use nio_mux::{channel_hub, HubConfig, TransportConfig};

use common::{recv_packet, tcp_pair, ChannelReceiver};

#[test]
fn delivers_many_chunked_packets_in_order() {
    let (hub, handle) = channel_hub(HubConfig::default()).expect("build hub");
    hub.spawn();

    let (client_sock, server_sock) = tcp_pair();
    let cfg = TransportConfig::new(16);

    let client = handle
        .create_transport(Endpoint::mono_tcp(client_sock).unwrap(), cfg)
        .expect("create client transport");
    let server = handle
        .create_transport(Endpoint::mono_tcp(server_sock).unwrap(), cfg)
        .expect("create server transport");

    let (receiver, rx) = ChannelReceiver::new();
    server.setup(receiver);

    let sizes: Vec<usize> = (0..1024)
        .map(|i| match i % 8 {
            0 => 0,
            1 => 1,
            2 => 15,
            3 => 16,
            4 => 17,
            5 => 31,
            6 => 32,
            _ => 97,
        })
        .collect();

    let expected: Vec<Vec<u8>> = sizes
        .iter()
        .enumerate()
        .map(|(i, &len)| (0..len).map(|j| ((i + j) % 251) as u8).collect())
        .collect();

    let to_send = expected.clone();
    let writer = std::thread::spawn(move || {
        for packet in &to_send {
            client.write_block(packet).expect("write_block");
        }
    });

    let mut received = Vec::new();
    for expected_packet in &expected {
        if expected_packet.is_empty() {
            // An all-empty packet body is indistinguishable from "nothing
            // sent" on the wire and is silently dropped by design; skip it.
            continue;
        }
        received.push(recv_packet(&rx, Duration::from_secs(10)));
        assert_eq!(received.last().unwrap(), expected_packet);
    }

    writer.join().expect("writer thread");
    nio_mux::ChannelHub::shutdown(&handle);
}
