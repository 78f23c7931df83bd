//! `HubConfig { use_nio: false }`: transports never touch the selector at
//! all, each running its own reader/writer thread pair instead. Framing,
//! half-close, and abort all need to keep working identically either way.

mod common;

use std::time::Duration;

use nio_mux::endpoint::Endpoint;
use nio_mux::error::TransportError;
use nio_mux::{channel_hub, HubConfig, TransportConfig};

use common::{recv_packet, recv_terminate, tcp_pair, ChannelReceiver};

#[test]
fn delivers_packets_without_a_selector() {
    let (hub, handle) = channel_hub(HubConfig {
        use_nio: false,
        ..HubConfig::default()
    })
    .expect("build hub");
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

    client.write_block(b"no selector needed").expect("write_block");
    let received = recv_packet(&rx, Duration::from_secs(10));
    assert_eq!(received, b"no selector needed");

    client.close_write();
    let cause = recv_terminate(&rx, Duration::from_secs(10));
    assert!(matches!(cause, TransportError::Aborted(_)));

    nio_mux::ChannelHub::shutdown(&handle);
}
