//! Safe wrapper over [`sys::Selector`](crate::sys::Selector).
//!
//! A `Poll` is the hub's one selector; a `Registry` is the cheaply-cloneable
//! handle transports use to (re)register themselves. This split mirrors
//! `mio::Poll` / `mio::Registry` so that registration can be called from any
//! thread while the blocking `poll` call stays owned by the selector thread.

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use crate::interest::Interest;
use crate::source::Source;
use crate::sys::{self, Events};
use crate::token::Token;

pub struct Poll {
    registry: Registry,
}

#[derive(Clone)]
pub struct Registry {
    selector: Arc<sys::Selector>,
}

impl Poll {
    pub fn new() -> io::Result<Poll> {
        let selector = Arc::new(sys::Selector::new()?);
        Ok(Poll {
            registry: Registry { selector },
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Blocks the calling (selector) thread until at least one readiness
    /// event is ready or `timeout` elapses. Never called from anywhere but
    /// the hub's own select loop.
    pub fn poll(&mut self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        self.registry.selector.select(events, timeout)
    }
}

impl Registry {
    /// (Re)registers `source`, dispatching through [`Source::register`] so
    /// any `AsRawFd` endpoint can be registered without this crate needing
    /// to know its concrete type (mirrors `mio::Registry::register`).
    pub fn register<S: Source + ?Sized>(
        &self,
        source: &mut S,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        source.register(self, token, interest)
    }

    pub fn reregister<S: Source + ?Sized>(
        &self,
        source: &mut S,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        source.reregister(self, token, interest)
    }

    pub fn deregister<S: Source + ?Sized>(&self, source: &mut S) -> io::Result<()> {
        source.deregister(self)
    }

    /// Raw-fd-level registration the blanket [`Source`] impl bottoms out in.
    pub(crate) fn register_fd(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        sys::Selector::register(&self.selector, fd, token, interest)
    }

    pub(crate) fn reregister_fd(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        sys::Selector::reregister(&self.selector, fd, token, interest)
    }

    pub(crate) fn deregister_fd(&self, fd: RawFd) -> io::Result<()> {
        sys::Selector::deregister(&self.selector, fd)
    }

    pub(crate) fn selector(&self) -> &sys::Selector {
        &self.selector
    }
}
