//! A client that writes one packet and then half-closes its write side:
//! the server must still see the packet, and only afterwards observe the
//! peer's orderly close.

mod common;

use std::time::Duration;

use nio_mux::endpoint::Endpoint;
use nio_mux::error::TransportError;
use nio_mux::{channel_hub, HubConfig, TransportConfig};

use common::{recv_packet, recv_terminate, tcp_pair, ChannelReceiver};

#[test]
fn drains_queued_data_before_delivering_the_peer_close() {
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

    client.write_block(b"last words before close").expect("write_block");
    client.close_write();

    let received = recv_packet(&rx, Duration::from_secs(10));
    assert_eq!(received, b"last words before close");

    let cause = recv_terminate(&rx, Duration::from_secs(10));
    assert!(matches!(cause, TransportError::Aborted(_)));
    nio_mux::ChannelHub::shutdown(&handle);
}
