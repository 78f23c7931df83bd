//! A command that can never fit inside its ingress buffer wedges the
//! parser; the transport must detect that and abort rather than spin
//! forever waiting for a complete packet.

mod common;

use std::time::Duration;

use nio_mux::endpoint::Endpoint;
use nio_mux::error::TransportError;
use nio_mux::{channel_hub, HubConfig, TransportConfig};

use common::{recv_terminate, tcp_pair, ChannelReceiver};

#[test]
fn aborts_on_a_command_too_big_for_its_buffer() {
    let (hub, handle) = channel_hub(HubConfig::default()).expect("build hub");
    hub.spawn();

    let (client_sock, server_sock) = tcp_pair();

    let tight_cfg = TransportConfig {
        ingress_page_size: 8,
        ingress_capacity: 8,
        ..TransportConfig::default()
    };
    let client = handle
        .create_transport(
            Endpoint::mono_tcp(client_sock).unwrap(),
            TransportConfig::default(),
        )
        .expect("create client transport");
    let server = handle
        .create_transport(Endpoint::mono_tcp(server_sock).unwrap(), tight_cfg)
        .expect("create server transport");

    let (receiver, rx) = ChannelReceiver::new();
    server.setup(receiver);

    // One chunk, 100-byte body: never fits under an 8-byte ingress cap.
    client.write_block(&vec![7u8; 100]).expect("write_block");

    let cause = recv_terminate(&rx, Duration::from_secs(10));
    assert!(matches!(cause, TransportError::Overflow(_)));
    nio_mux::ChannelHub::shutdown(&handle);
}
