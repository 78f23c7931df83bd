//! A selector-thread-based, chunk-framed multiplexed transport core.
//!
//! One [`hub::ChannelHub`] owns a single OS selector (`epoll` on Linux) and
//! drains it on a dedicated thread. Any number of [`transport::NioTransport`]
//! instances register against it, each pairing a selectable
//! [`endpoint::Endpoint`] with an ingress/egress [`buffer::FifoBuffer`] and a
//! per-connection [`executor::Lane`] that guarantees in-order, one-at-a-time
//! packet delivery without a dedicated thread per connection.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nio_mux::{HubConfig, TransportConfig, TransportError};
//! use nio_mux::endpoint::Endpoint;
//! use nio_mux::transport::PacketReceiver;
//!
//! struct Echo;
//! impl PacketReceiver for Echo {
//!     fn handle(&self, packet: Vec<u8>) {
//!         let _ = packet;
//!     }
//!     fn terminate(&self, _cause: TransportError) {}
//! }
//!
//! # fn connect() -> std::io::Result<std::net::TcpStream> { unimplemented!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (hub, handle) = nio_mux::hub::channel_hub(HubConfig::default())?;
//! hub.spawn();
//! let endpoint = Endpoint::mono_tcp(connect()?)?;
//! let transport = handle.create_transport(endpoint, TransportConfig::default())?;
//! transport.setup(Arc::new(Echo));
//! transport.write_block(b"hello")?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod capability;
pub mod chunk;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod hub;
pub mod interest;
pub mod poll;
mod sys;
pub mod source;
pub mod token;
pub mod transport;

pub use capability::CapabilitySet;
pub use config::{HubConfig, TransportConfig};
pub use error::TransportError;
pub use hub::{channel_hub, ChannelHub, HubHandle};
pub use interest::Interest;
pub use token::Token;
pub use transport::{NioTransport, PacketReceiver};
