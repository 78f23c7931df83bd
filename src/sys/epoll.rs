//! Linux/Android selector backend, built directly on `epoll(7)`.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use libc::{EPOLLERR, EPOLLET, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP};

use crate::interest::Interest;
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

/// Thin wrapper around one `epoll` instance.
///
/// The hub owns exactly one `Selector`; it is the only thing touched from
/// the selector thread, except for the cross-thread [`Waker`].
#[derive(Debug)]
pub struct Selector {
    ep: OwnedFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        // SAFETY: `epoll_create1(2)` either returns a valid owned fd or -1.
        let ep = unsafe { OwnedFd::from_raw_fd(syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?) };
        Ok(Selector { ep })
    }

    pub fn try_clone(&self) -> io::Result<Selector> {
        self.ep.try_clone().map(|ep| Selector { ep })
    }

    /// Block for up to `timeout` (or forever when `None`) and fill `events`
    /// with whatever the kernel reported. Never loops internally past one
    /// `epoll_wait` call, mirroring the "never loop on partial I/O" rule the
    /// rest of this crate follows for socket reads and writes.
    pub fn select(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|to| {
                to.checked_add(Duration::from_nanos(999_999))
                    .unwrap_or(to)
                    .as_millis() as libc::c_int
            })
            .unwrap_or(-1);

        events.inner.clear();
        let n = syscall!(epoll_wait(
            self.ep.as_raw_fd(),
            events.inner.as_mut_ptr(),
            events.inner.capacity() as i32,
            timeout_ms,
        ))?;
        // SAFETY: epoll_wait guarantees the first `n` slots were written.
        unsafe { events.inner.set_len(n as usize) };
        Ok(())
    }

    pub fn register(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = raw_event(token, interest);
        syscall!(epoll_ctl(self.ep.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)).map(drop)
    }

    pub fn reregister(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = raw_event(token, interest);
        syscall!(epoll_ctl(self.ep.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut event)).map(drop)
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        syscall!(epoll_ctl(
            self.ep.as_raw_fd(),
            libc::EPOLL_CTL_DEL,
            fd,
            std::ptr::null_mut()
        ))
        .map(drop)
    }
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.ep.as_raw_fd()
    }
}

fn raw_event(token: Token, interest: Interest) -> libc::epoll_event {
    let mut kind = EPOLLET;
    if interest.is_readable() {
        kind |= EPOLLIN | EPOLLRDHUP;
    }
    if interest.is_writable() {
        kind |= EPOLLOUT;
    }
    libc::epoll_event {
        events: kind as u32,
        u64: usize::from(token) as u64,
    }
}

/// Readiness events filled in by one [`Selector::select`] call.
#[derive(Debug)]
pub struct Events {
    inner: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Events {
        Events {
            inner: Vec::with_capacity(capacity),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Event<'_>> {
        self.inner.iter().map(Event)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Borrowed view of a single raw `epoll_event`.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a>(&'a libc::epoll_event);

impl Event<'_> {
    pub fn token(&self) -> Token {
        Token(self.0.u64 as usize)
    }

    pub fn is_readable(&self) -> bool {
        (self.0.events as libc::c_int) & (EPOLLIN | EPOLLRDHUP) != 0
    }

    pub fn is_writable(&self) -> bool {
        (self.0.events as libc::c_int) & EPOLLOUT != 0
    }

    pub fn is_error(&self) -> bool {
        (self.0.events as libc::c_int) & EPOLLERR != 0
    }

    pub fn is_read_closed(&self) -> bool {
        let bits = self.0.events as libc::c_int;
        bits & EPOLLHUP != 0 || (bits & EPOLLIN != 0 && bits & EPOLLRDHUP != 0)
    }

    pub fn is_write_closed(&self) -> bool {
        let bits = self.0.events as libc::c_int;
        bits & EPOLLHUP != 0 || (bits & EPOLLOUT != 0 && bits & EPOLLERR != 0)
    }
}
