//! The registration seam every selectable byte-stream endpoint implements.

use std::io;

use crate::interest::Interest;
use crate::poll::Registry;
use crate::token::Token;

/// A resource that can be registered with a [`Registry`].
///
/// Mirrors `mio::event::Source`, minus the parts (AIO/LIO interest,
/// Windows IOCP quirks) this crate's spec has no use for.
pub trait Source {
    fn register(&mut self, registry: &Registry, token: Token, interest: Interest)
        -> io::Result<()>;

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interest: Interest,
    ) -> io::Result<()>;

    fn deregister(&mut self, registry: &Registry) -> io::Result<()>;
}

impl<T: std::os::fd::AsRawFd> Source for T {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        registry.register_fd(std::os::fd::AsRawFd::as_raw_fd(self), token, interest)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        registry.reregister_fd(std::os::fd::AsRawFd::as_raw_fd(self), token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister_fd(std::os::fd::AsRawFd::as_raw_fd(self))
    }
}
