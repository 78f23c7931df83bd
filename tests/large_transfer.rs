//! End-to-end copy of a large, deterministic random payload across a real
//! loopback TCP connection, exercising chunking, backpressure on the egress
//! buffer, and reassembly on the ingress side in one pass.

mod common;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use nio_mux::endpoint::Endpoint;
use nio_mux::{channel_hub, HubConfig, TransportConfig};

use common::{recv_packet, tcp_pair, ChannelReceiver};

#[test]
fn copies_ten_megabytes_intact() {
    let (hub, handle) = channel_hub(HubConfig::default()).expect("build hub");
    hub.spawn();

    let (client_sock, server_sock) = tcp_pair();

    let client = handle
        .create_transport(
            Endpoint::mono_tcp(client_sock).unwrap(),
            TransportConfig::default(),
        )
        .expect("create client transport");
    let server = handle
        .create_transport(
            Endpoint::mono_tcp(server_sock).unwrap(),
            TransportConfig::default(),
        )
        .expect("create server transport");

    let (receiver, rx) = ChannelReceiver::new();
    server.setup(receiver);

    let mut rng = StdRng::seed_from_u64(0);
    let mut payload = vec![0u8; 10 * 1024 * 1024];
    rng.fill_bytes(&mut payload);

    let expected = payload.clone();
    let writer = std::thread::spawn(move || {
        client.write_block(&payload).expect("write_block");
    });

    let received = recv_packet(&rx, Duration::from_secs(30));
    writer.join().expect("writer thread");

    assert_eq!(received.len(), expected.len());
    assert_eq!(received, expected);
    nio_mux::ChannelHub::shutdown(&handle);
}
