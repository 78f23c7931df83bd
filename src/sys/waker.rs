//! Cross-thread selector wakeup, backed by `eventfd(2)`.
//!
//! Any thread may call [`Waker::wake`] — enqueueing a selector task and
//! waking the selector are meant to be paired, since the selector thread
//! only drains the task queue once per `select()` wakeup (spec §4.5, §5).

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

use crate::interest::Interest;
use crate::sys::epoll::Selector;
use crate::token::Token;

macro_rules! syscall {
    ($fn:ident($($arg:expr),* $(,)*)) => {{
        let res = unsafe { libc::$fn($($arg),*) };
        if res == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

#[derive(Debug)]
pub struct Waker {
    fd: File,
}

impl Waker {
    pub fn new(selector: &Selector, token: Token) -> io::Result<Waker> {
        let raw = syscall!(eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK))?;
        // SAFETY: `eventfd(2)` returned a freshly-owned fd.
        let fd = unsafe { File::from_raw_fd(raw) };
        selector.register(fd.as_raw_fd(), token, Interest::READABLE)?;
        Ok(Waker { fd })
    }

    /// Wakes the selector's blocked `select()` call. Never blocks: the
    /// eventfd counter is reset and retried on the one error case
    /// (`WouldBlock`, from the counter nearing overflow) where a write could
    /// otherwise block.
    pub fn wake(&self) -> io::Result<()> {
        let buf = 1u64.to_ne_bytes();
        match (&self.fd).write(&buf) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                self.drain()?;
                self.wake()
            }
            Err(err) => Err(err),
        }
    }

    /// Acknowledges a wakeup so the eventfd becomes non-readable again.
    /// Called by the selector thread after observing the waker's token.
    pub fn ack(&self) {
        let _ = self.drain();
    }

    fn drain(&self) -> io::Result<()> {
        let mut buf = [0u8; 8];
        match (&self.fd).read(&mut buf) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
