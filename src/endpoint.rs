//! Selectable byte-stream endpoints (spec §3 "one or two byte-oriented
//! stream endpoints", §6 "optional adapter converts POSIX file descriptors
//! ... into selectable streams").
//!
//! On Unix a raw file descriptor is a raw file descriptor regardless of
//! whether the kernel object behind it is a TCP socket, a Unix socket, or
//! one end of a pipe — `read(2)`/`write(2)` work the same way on all three.
//! `FdStream` leans on that and wraps `std::fs::File`, which already gives
//! `Read`/`Write`/`AsRawFd` for free, instead of hand-rolling raw syscalls.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// A single selectable byte-stream endpoint.
pub struct FdStream {
    file: File,
}

impl FdStream {
    /// Wraps an already-nonblocking file descriptor.
    pub fn from_owned_fd(fd: OwnedFd) -> FdStream {
        FdStream { file: File::from(fd) }
    }

    /// Converts a connected `TcpStream` into a selectable endpoint,
    /// switching it into non-blocking mode first (the hub never calls a
    /// blocking read/write against the kernel).
    pub fn from_tcp_stream(stream: TcpStream) -> io::Result<FdStream> {
        stream.set_nonblocking(true)?;
        let owned: OwnedFd = stream.into();
        Ok(FdStream::from_owned_fd(owned))
    }

    /// Adapts a raw POSIX file descriptor (a pipe end from a split
    /// stdin/stdout agent launch, say) into a selectable endpoint by
    /// setting `O_NONBLOCK` via `fcntl(2)`.
    ///
    /// # Safety
    ///
    /// `fd` must be a valid, open, not-otherwise-owned file descriptor;
    /// ownership transfers to the returned `FdStream`.
    pub unsafe fn from_raw_fd_adapting(fd: RawFd) -> io::Result<FdStream> {
        set_nonblocking(fd)?;
        let owned = OwnedFd::from_raw_fd(fd);
        Ok(FdStream::from_owned_fd(owned))
    }

    /// Best-effort half-close: shuts down the write side if this
    /// descriptor is a socket, and is a harmless no-op (ignored error) on a
    /// pipe or regular file, matching spec's "both ends are closed
    /// best-effort".
    pub fn shutdown_write(&self) {
        shutdown(self.file.as_raw_fd(), libc::SHUT_WR);
    }

    pub fn shutdown_read(&self) {
        shutdown(self.file.as_raw_fd(), libc::SHUT_RD);
    }
}

impl Read for FdStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for FdStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl AsRawFd for FdStream {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let res = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn shutdown(fd: RawFd, how: libc::c_int) {
    // ENOTSOCK is expected (and fine) for pipes/regular files.
    let _ = unsafe { libc::shutdown(fd, how) };
}

/// Either one duplex endpoint (a socket) or two independent simplex
/// endpoints (split stdin/stdout), per spec §9 "Dynamic dispatch over
/// read/write endpoints": a tagged enum dispatched by pattern match rather
/// than an inheritance hierarchy.
pub enum Endpoint {
    Mono(FdStream),
    Dual { read: FdStream, write: FdStream },
}

impl Endpoint {
    pub fn mono_tcp(stream: TcpStream) -> io::Result<Endpoint> {
        Ok(Endpoint::Mono(FdStream::from_tcp_stream(stream)?))
    }

    pub fn dual(read: FdStream, write: FdStream) -> Endpoint {
        Endpoint::Dual { read, write }
    }
}
