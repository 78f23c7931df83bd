//! Shared harness for the integration tests in this directory.

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use nio_mux::error::TransportError;
use nio_mux::transport::PacketReceiver;

/// One event delivered to a test's receiving end.
pub enum Delivery {
    Packet(Vec<u8>),
    Terminate(TransportError),
}

/// A [`PacketReceiver`] that forwards everything to an `mpsc` channel so
/// tests can assert on delivery order and content from the main thread.
pub struct ChannelReceiver {
    tx: Sender<Delivery>,
}

impl ChannelReceiver {
    pub fn new() -> (Arc<ChannelReceiver>, Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(ChannelReceiver { tx }), rx)
    }
}

impl PacketReceiver for ChannelReceiver {
    fn handle(&self, packet: Vec<u8>) {
        let _ = self.tx.send(Delivery::Packet(packet));
    }

    fn terminate(&self, cause: TransportError) {
        let _ = self.tx.send(Delivery::Terminate(cause));
    }
}

/// Two ends of a loopback TCP connection, for exercising `Endpoint::Mono`
/// without needing a privileged or external peer.
pub fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener local addr");
    let client = TcpStream::connect(addr).expect("connect loopback client");
    let (server, _) = listener.accept().expect("accept loopback server");
    client.set_nodelay(true).ok();
    server.set_nodelay(true).ok();
    (client, server)
}

/// Blocks until `rx` yields a `Delivery::Packet`, panicking past `timeout`.
/// Tests use this instead of `recv()` so a hung selector thread fails fast
/// with a clear message rather than wedging the test run.
pub fn recv_packet(rx: &Receiver<Delivery>, timeout: Duration) -> Vec<u8> {
    match rx.recv_timeout(timeout) {
        Ok(Delivery::Packet(p)) => p,
        Ok(Delivery::Terminate(cause)) => panic!("expected a packet, got terminate({cause})"),
        Err(e) => panic!("timed out waiting for a packet: {e}"),
    }
}

pub fn recv_terminate(rx: &Receiver<Delivery>, timeout: Duration) -> TransportError {
    match rx.recv_timeout(timeout) {
        Ok(Delivery::Terminate(cause)) => cause,
        Ok(Delivery::Packet(p)) => panic!("expected terminate, got a {}-byte packet", p.len()),
        Err(e) => panic!("timed out waiting for terminate: {e}"),
    }
}
